use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::io::AsyncRead;

/// A local file selected for upload.
///
/// The source can be opened any number of times, so a fingerprint computation which gets
/// superseded or has to be redone never depends on a consumed input handle.
#[derive(Clone, Debug)]
pub enum FileSource {
    Path {
        path: PathBuf,
        name: String,
        content_type: Option<String>,
    },
    Memory {
        name: String,
        data: Bytes,
        content_type: Option<String>,
    },
}

impl FileSource {
    /// Refers to a file on disk, named after the last component of its path.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path {} has no usable file name", path.display()),
                )
            })?
            .to_string();
        Ok(Self::Path {
            path: path.to_path_buf(),
            name,
            content_type: None,
        })
    }

    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::Memory {
            name: name.into(),
            data: data.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, value: impl Into<String>) -> Self {
        match &mut self {
            Self::Path { content_type, .. } | Self::Memory { content_type, .. } => {
                *content_type = Some(value.into());
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Path { name, .. } | Self::Memory { name, .. } => name,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            Self::Path { content_type, .. } | Self::Memory { content_type, .. } => {
                content_type.as_deref()
            }
        }
    }

    /// Opens a fresh reader over the file contents.
    pub async fn open(&self) -> io::Result<Box<dyn AsyncRead + Send + Unpin>> {
        match self {
            Self::Path { path, .. } => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Box::new(file))
            }
            Self::Memory { data, .. } => Ok(Box::new(io::Cursor::new(data.clone()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::FileSource;

    #[test]
    fn name_from_path() {
        let source = FileSource::from_path("/tmp/assets/sword.json").unwrap();
        assert_eq!(source.name(), "sword.json");
        assert_eq!(source.content_type(), None);
        assert!(FileSource::from_path("/").is_err());
    }

    #[tokio::test]
    async fn memory_source_can_be_opened_twice() {
        let source = FileSource::from_bytes("a.txt", &b"hello"[..]).with_content_type("text/plain");
        assert_eq!(source.content_type(), Some("text/plain"));

        for _ in 0..2 {
            let mut buf = Vec::new();
            source.open().await.unwrap().read_to_end(&mut buf).await.unwrap();
            assert_eq!(buf, b"hello");
        }
    }
}
