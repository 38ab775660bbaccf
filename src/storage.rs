use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::util;


const FILE_SIZE_LIMIT: usize = 5 * 1024 * 1024; // bytes
const ALLOWED_EXTS: [&'static str; 5] = ["jpeg", "jpg", "png", "bmp", "webp"];


#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid uri")]
    InvalidUri,
    #[error("Invalid extension")]
    InvalidExtension,
    #[error("The file is too large")]
    TooLarge,
    #[error("Invalid image data: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("Fail to store image: {0}")]
    Io(#[from] io::Error),
}


/// A decoded attachment waiting to be uploaded.
#[derive(Debug, PartialEq)]
pub struct ImageUpload {
    pub ext: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Parses `data:image/<ext>;base64,<payload>`.
    pub fn from_data_uri(data_uri: &str) -> Result<Self, StorageError> {
        let mut halves = data_uri.splitn(2, ',');
        let header = halves.next().ok_or(StorageError::InvalidUri)?;
        let payload = halves.next().ok_or(StorageError::InvalidUri)?;

        let ext = header.split('/').nth(1)
            .and_then(|x| x.split(';').next())
            .ok_or(StorageError::InvalidUri)?
            .to_lowercase();

        if !ALLOWED_EXTS.iter().any(|&x| x == ext) {
            return Err(StorageError::InvalidExtension);
        }

        // Four base64 chars carry three bytes.
        if payload.len() / 4 * 3 > FILE_SIZE_LIMIT + 3 {
            return Err(StorageError::TooLarge);
        }

        let bytes = base64::decode(payload.trim())?;
        if bytes.len() > FILE_SIZE_LIMIT {
            return Err(StorageError::TooLarge);
        }

        Ok(ImageUpload { ext, bytes })
    }
}


pub trait ObjectStorage: Send + Sync {
    /// Stores the image and returns the reference to embed in the report.
    fn upload(&self, image: &ImageUpload) -> Result<String, StorageError>;

    /// Deletes an upload that ended up attached to nothing.
    fn remove(&self, reference: &str) -> Result<(), StorageError>;
}


/// Keeps uploads in a directory served as static files.
pub struct DirStorage {
    dir: PathBuf,
    public_prefix: String,
}

impl DirStorage {
    pub fn new<P: Into<PathBuf>>(dir: P, public_prefix: &str) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        Ok(DirStorage {
            dir,
            public_prefix: public_prefix.trim_end_matches('/').to_owned(),
        })
    }
}

impl ObjectStorage for DirStorage {
    fn upload(&self, image: &ImageUpload) -> Result<String, StorageError> {
        // Create unique name and file for the image.
        let (name, mut file) = loop {
            let name = util::generate_rand_id(32) + "." + &image.ext;
            let file_result = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.dir.join(&name));

            match file_result {
                Ok(file) => break (name, file),
                Err(ref err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        };

        if let Err(err) = file.write_all(&image.bytes) {
            drop(file);
            let _ = fs::remove_file(self.dir.join(&name));
            return Err(err.into());
        }
        info!("Stored image {} ({} bytes)", name, image.bytes.len());

        Ok(format!("{}/{}", self.public_prefix, name))
    }

    fn remove(&self, reference: &str) -> Result<(), StorageError> {
        // Only ever a bare file name inside our directory.
        let name = Path::new(reference).file_name()
            .ok_or(StorageError::InvalidUri)?;

        fs::remove_file(self.dir.join(name))?;
        info!("Removed image {}", reference);
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_is_decoded() {
        let image = ImageUpload::from_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(image.ext, "png");
        assert_eq!(image.bytes, b"hello".to_vec());
    }

    #[test]
    fn foreign_extension_is_rejected() {
        let result = ImageUpload::from_data_uri("data:application/pdf;base64,aGVsbG8=");
        assert!(matches!(result, Err(StorageError::InvalidExtension)));
    }

    #[test]
    fn missing_payload_is_rejected() {
        let result = ImageUpload::from_data_uri("data:image/png;base64");
        assert!(matches!(result, Err(StorageError::InvalidUri)));
    }

    #[test]
    fn upload_writes_under_random_name() {
        let dir = std::env::temp_dir().join(format!("crime-map-{}", util::generate_rand_id(8)));
        let storage = DirStorage::new(&dir, "images/").unwrap();
        let image = ImageUpload { ext: "jpg".into(), bytes: vec![1, 2, 3] };

        let reference = storage.upload(&image).unwrap();
        assert!(reference.starts_with("images/"));
        assert!(reference.ends_with(".jpg"));

        let name = reference.trim_start_matches("images/");
        assert_eq!(fs::read(dir.join(name)).unwrap(), vec![1, 2, 3]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn remove_deletes_only_inside_the_directory() {
        let dir = std::env::temp_dir().join(format!("crime-map-{}", util::generate_rand_id(8)));
        let storage = DirStorage::new(&dir, "/images").unwrap();
        let image = ImageUpload { ext: "png".into(), bytes: vec![7] };

        let reference = storage.upload(&image).unwrap();
        let name = reference.trim_start_matches("/images/").to_owned();
        assert!(dir.join(&name).exists());

        storage.remove(&format!("/images/../../{}", name)).unwrap();
        assert!(!dir.join(&name).exists());

        assert!(storage.remove(&reference).is_err());
        assert!(matches!(storage.remove("/images/.."), Err(StorageError::InvalidUri)));

        let _ = fs::remove_dir_all(&dir);
    }
}
