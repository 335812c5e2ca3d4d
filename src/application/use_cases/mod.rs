mod delete_object;
mod download_object;
mod stat_objects;
mod upload_object;

pub use delete_object::{DeleteError, DeleteObjectUseCase};
pub use download_object::{DownloadError, DownloadObjectUseCase, DownloadedObject};
pub use stat_objects::{StatError, StatObjectsUseCase};
pub use upload_object::{UploadError, UploadObjectUseCase, DEFAULT_MAX_FILE_SIZE_BYTES};
