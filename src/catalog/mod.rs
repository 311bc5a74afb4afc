pub mod dto;
pub(crate) mod handler;
pub mod store;

pub use dto::{
    DownloadDescriptor, DownloadPluginRequest, Plugin, PluginCreate, PluginStatus, PluginUpdate,
    PluginVersion, PluginVersionCreate, PluginVisibility, RegistryEntry, VersionUpload,
};
pub use store::PluginCatalog;
