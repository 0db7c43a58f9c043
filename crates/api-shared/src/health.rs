use crate::HealthRes;

/// Simple health service shared by the REST server and any future front end.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Static method to check health without creating an instance.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "Stack service is alive".into(),
        }
    }
}
