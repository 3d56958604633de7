#[cfg(feature = "integration_miraie")]
use std::sync::Arc;

#[cfg(feature = "integration_miraie")]
pub mod miraie;

/// Vendor clients handed to integration factories.
///
/// Integrations that talk to a vendor cloud do not carry the vendor protocol
/// themselves; the embedding application supplies a connector for each one it
/// wants to enable.
#[derive(Clone, Default)]
pub struct Connectors {
    #[cfg(feature = "integration_miraie")]
    pub miraie: Option<Arc<dyn miraie::Connector>>,
}
