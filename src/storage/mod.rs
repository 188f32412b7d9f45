mod directory;
mod gateway;

pub use directory::DirectoryStorage;
pub use gateway::{
    GeoLocation, MediaRecord, NewMediaRecord, RecordRef, SpaceStatus, StorageGateway,
};
