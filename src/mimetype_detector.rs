use std::path::Path;

/// Detects MIME type based on file extension
pub fn from_path(path: &Path) -> Option<MimeType> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(from_extension)
}

/// Detects an image MIME type by sniffing the content's magic bytes
pub fn from_bytes(bytes: &[u8]) -> Option<MimeType> {
    let format = image::guess_format(bytes).ok()?;
    format.extensions_str().iter().find_map(|ext| from_extension(ext))
}

/// Detects MIME type from file extension string
fn from_extension(ext: &str) -> Option<MimeType> {
    let ext_lower = ext.to_lowercase();
    match ext_lower.as_str() {
        "jpg" | "jpeg" => Some(MimeType::new("image", "jpeg")),
        "png" => Some(MimeType::new("image", "png")),
        "gif" => Some(MimeType::new("image", "gif")),
        "webp" => Some(MimeType::new("image", "webp")),
        "bmp" => Some(MimeType::new("image", "bmp")),
        "tiff" | "tif" => Some(MimeType::new("image", "tiff")),
        "tga" => Some(MimeType::new("image", "x-tga")),
        "qoi" => Some(MimeType::new("image", "x-qoi")),
        "hdr" => Some(MimeType::new("image", "vnd.radiance")),
        "pbm" | "pgm" | "ppm" | "pnm" | "pam" => Some(MimeType::new("image", "x-portable-anymap")),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType {
    type_: String,
    subtype: String,
}

impl MimeType {
    fn new(type_: &str, subtype: &str) -> Self {
        Self {
            type_: type_.to_string(),
            subtype: subtype.to_string(),
        }
    }

    pub fn type_(&self) -> &str {
        &self.type_
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    pub fn is_image(&self) -> bool {
        self.type_ == "image"
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;
    use std::path::PathBuf;

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(4, 4)
            .write_to(&mut buffer, format)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_image_types() {
        assert_eq!(
            from_path(&PathBuf::from("photo.jpg")).unwrap().to_string(),
            "image/jpeg"
        );
        assert_eq!(
            from_path(&PathBuf::from("photo.JPG")).unwrap().to_string(),
            "image/jpeg"
        );
        assert_eq!(
            from_path(&PathBuf::from("photo.png")).unwrap().to_string(),
            "image/png"
        );
        assert_eq!(
            from_path(&PathBuf::from("photo.webp")).unwrap().to_string(),
            "image/webp"
        );
    }

    #[test]
    fn test_sniffed_types() {
        assert_eq!(from_bytes(&encoded(ImageFormat::Png)).unwrap().to_string(), "image/png");
        assert_eq!(from_bytes(&encoded(ImageFormat::Jpeg)).unwrap().to_string(), "image/jpeg");
    }

    #[test]
    fn test_unknown_type() {
        assert!(from_path(&PathBuf::from("file.xyz")).is_none());
        assert!(from_bytes(b"plain text, definitely not an image").is_none());
        assert!(from_bytes(&[]).is_none());
    }

    #[test]
    fn test_type_and_subtype() {
        let mime = from_bytes(&encoded(ImageFormat::Png)).unwrap();
        assert_eq!(mime.type_(), "image");
        assert_eq!(mime.subtype(), "png");
        assert!(mime.is_image());
    }
}
