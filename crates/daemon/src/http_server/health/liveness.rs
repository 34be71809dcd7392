use super::Probe;

/// Answers as long as the process can serve HTTP at all. Nothing else is
/// consulted; see [`super::readiness::handler`] for the database check.
#[tracing::instrument]
pub async fn handler() -> Probe {
    Probe::ok()
}
