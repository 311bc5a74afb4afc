pub mod dto;
pub(crate) mod handler;
pub mod store;

pub use dto::{
    HasLicenseParams, HasLicenseResponse, LicenseCreate, LicenseStatus, LicenseUpdate,
    PluginLicense, PurchaseRequest, VerifyOutcome, VerifyRequest,
};
pub use store::LicenseStore;
