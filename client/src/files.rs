//! Document and image handling
//!
//! Client-side validation of uploads (MIME type and size, before any bytes
//! leave the machine), large-image recompression, and the per-entity
//! document endpoints behind one service. Every surface that accepts files
//! binds them to a multipart part named `File`; what differs per entity is
//! the endpoint, the owner field and the validation rule, which is what
//! [`DocumentKind`] captures.

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::endpoints;
use crate::error::{ApiError, ApiResult};
use crate::gateway::{decode, ApiGateway, DownloadedFile, UploadRequest};
use crate::models::Documento;

/// Default upload ceiling for images
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
/// Default upload ceiling for documents
pub const MAX_DOCUMENT_BYTES: usize = 25 * 1024 * 1024;

/// Images above this size get recompressed before upload
const COMPRESS_THRESHOLD_BYTES: usize = 1024 * 1024;
const COMPRESS_MAX_WIDTH: u32 = 1920;
const COMPRESS_MAX_HEIGHT: u32 = 1080;
const COMPRESS_JPEG_QUALITY: u8 = 80;

const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

const DOCUMENT_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// A file staged for upload
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Progress report handed to the callback during a multi-file upload
#[derive(Debug, Clone)]
pub struct UploadProgress {
    /// 1-based index of the file currently uploading
    pub current: usize,
    pub total: usize,
    pub file_name: String,
    /// Whole-file granularity, 0-100
    pub percentage: u8,
}

/// Per-file outcome of a batch upload
#[derive(Debug)]
pub struct UploadOutcome {
    pub file_name: String,
    pub result: ApiResult<Documento>,
}

/// Result of a batch upload; a failed file never aborts the rest
#[derive(Debug)]
pub struct UploadSummary {
    pub total_uploaded: usize,
    pub total_failed: usize,
    pub results: Vec<UploadOutcome>,
}

/// Reject non-image types and oversized files before any network call
pub fn validate_image_file(file: &FileUpload, max_bytes: Option<usize>) -> ApiResult<()> {
    validate_file(file, IMAGE_MIME_TYPES, max_bytes.unwrap_or(MAX_IMAGE_BYTES))
}

/// Reject unsupported document types and oversized files before any
/// network call
pub fn validate_document_file(file: &FileUpload, max_bytes: Option<usize>) -> ApiResult<()> {
    validate_file(file, DOCUMENT_MIME_TYPES, max_bytes.unwrap_or(MAX_DOCUMENT_BYTES))
}

fn validate_file(file: &FileUpload, allowed: &[&str], max_bytes: usize) -> ApiResult<()> {
    let mime = file.content_type.to_ascii_lowercase();
    if !allowed.contains(&mime.as_str()) {
        return Err(ApiError::Validation(format!(
            "Unsupported file type: {}",
            file.content_type
        )));
    }

    if file.bytes.len() > max_bytes {
        return Err(ApiError::Validation(format!(
            "File exceeds the {} limit",
            format_file_size(max_bytes as u64)
        )));
    }

    Ok(())
}

/// Lower-cased extension of a file name, when it has one
pub fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Human-readable size, e.g. "2.5 MB"
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// Recompress a large image to fit 1920x1080 as JPEG.
///
/// Files at or under the threshold pass through untouched. Decode or
/// encode failures also pass the original through; a full-size upload
/// beats a failed one.
pub fn compress_image(file: FileUpload) -> FileUpload {
    if file.bytes.len() <= COMPRESS_THRESHOLD_BYTES {
        return file;
    }

    let decoded = match image::load_from_memory(&file.bytes) {
        Ok(img) => img,
        Err(err) => {
            warn!(file = %file.file_name, error = %err, "image decode failed, uploading original");
            return file;
        }
    };

    let resized = decoded.thumbnail(COMPRESS_MAX_WIDTH, COMPRESS_MAX_HEIGHT);
    let rgb = resized.to_rgb8();

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), COMPRESS_JPEG_QUALITY);
    if let Err(err) = rgb.write_with_encoder(encoder) {
        warn!(file = %file.file_name, error = %err, "image encode failed, uploading original");
        return file;
    }

    debug!(
        file = %file.file_name,
        before = file.bytes.len(),
        after = out.len(),
        "image recompressed"
    );

    let file_name = match file.file_name.rsplit_once('.') {
        Some((stem, _)) => format!("{stem}.jpg"),
        None => format!("{}.jpg", file.file_name),
    };

    FileUpload {
        file_name,
        content_type: "image/jpeg".to_string(),
        bytes: out,
    }
}

/// Every file-accepting surface of the API, with its routing and rules.
///
/// `admin` picks the back-office controller over the buyer's self-service
/// one where both exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    ArticuloImagen,
    ArticuloDocumento,
    CompradorDocumento { admin: bool },
    ClienteDocumento,
    Garantia { admin: bool },
    Pago { admin: bool },
}

impl DocumentKind {
    /// Where the upload posts; gallery images carry the owner in the path,
    /// everything else in a form field
    pub fn upload_endpoint(self, owner_id: &str) -> String {
        match self {
            Self::ArticuloImagen => endpoints::subir_archivo(owner_id),
            Self::ArticuloDocumento => endpoints::POST_DOCUMENTO_ARTICULO.to_string(),
            Self::CompradorDocumento { admin: true } => {
                endpoints::POST_DOCUMENTO_COMPRADOR.to_string()
            }
            Self::CompradorDocumento { admin: false } => {
                endpoints::INFO_POST_DOCUMENTO.to_string()
            }
            Self::ClienteDocumento => endpoints::POST_DOCUMENTO_CLIENTE.to_string(),
            Self::Garantia { admin: true } => endpoints::ADMIN_POST_GARANTIA.to_string(),
            Self::Garantia { admin: false } => endpoints::POST_GARANTIA.to_string(),
            Self::Pago { admin: true } => endpoints::ADMIN_CREATE_ORDEN_PAGO_ITEM.to_string(),
            Self::Pago { admin: false } => endpoints::CREATE_ORDEN_PAGO_ITEM.to_string(),
        }
    }

    /// Form field naming the owning record, when the endpoint expects one
    pub fn owner_field(self) -> Option<&'static str> {
        match self {
            Self::ArticuloImagen => None,
            Self::ArticuloDocumento => Some("articuloID"),
            Self::CompradorDocumento { .. } | Self::Garantia { .. } | Self::Pago { .. } => {
                Some("compradorID")
            }
            Self::ClienteDocumento => Some("clienteID"),
        }
    }

    /// Validation rule for this surface: gallery images take the image
    /// rule, everything else the document rule
    pub fn validate(self, file: &FileUpload, max_bytes: Option<usize>) -> ApiResult<()> {
        match self {
            Self::ArticuloImagen => validate_image_file(file, max_bytes),
            _ => validate_document_file(file, max_bytes),
        }
    }

    /// Only gallery images get recompressed
    pub fn compresses(self) -> bool {
        self == Self::ArticuloImagen
    }

    /// Listing endpoint, for the kinds that have one; self-service listing
    /// is scoped by the session, so the owner id is ignored there
    pub fn list_endpoint(self, owner_id: &str) -> Option<String> {
        match self {
            Self::ArticuloImagen => Some(endpoints::lista_fotos(owner_id)),
            Self::ArticuloDocumento => Some(endpoints::articulo_documentos(owner_id)),
            Self::CompradorDocumento { admin: true } => {
                Some(endpoints::comprador_documentos(owner_id))
            }
            Self::CompradorDocumento { admin: false } => {
                Some(endpoints::INFO_GET_DOCUMENTOS.to_string())
            }
            Self::ClienteDocumento => Some(endpoints::cliente_documentos(owner_id)),
            Self::Garantia { .. } | Self::Pago { .. } => None,
        }
    }

    pub fn download_endpoint(self, documento_id: &str) -> Option<String> {
        match self {
            // gallery images are fetched straight from their URL
            Self::ArticuloImagen => None,
            Self::ArticuloDocumento => Some(endpoints::articulo_documento(documento_id)),
            Self::CompradorDocumento { admin: true } => {
                Some(endpoints::comprador_documento(documento_id))
            }
            Self::CompradorDocumento { admin: false } => {
                Some(endpoints::info_comprador_documento(documento_id))
            }
            Self::ClienteDocumento => Some(endpoints::cliente_documento(documento_id)),
            Self::Garantia { .. } => documento_id.parse().ok().map(endpoints::garantia_file),
            Self::Pago { .. } => Some(endpoints::orden_pago_documento(documento_id)),
        }
    }

    pub fn delete_endpoint(self, documento_id: &str) -> Option<String> {
        match self {
            Self::ArticuloImagen => Some(endpoints::delete_imagen(documento_id)),
            Self::ArticuloDocumento => Some(endpoints::delete_articulo_documento(documento_id)),
            Self::CompradorDocumento { admin: true } => {
                Some(endpoints::delete_comprador_documento(documento_id))
            }
            Self::CompradorDocumento { admin: false } => {
                Some(endpoints::info_delete_comprador_documento(documento_id))
            }
            Self::ClienteDocumento => Some(endpoints::delete_cliente_documento(documento_id)),
            Self::Garantia { .. } | Self::Pago { .. } => None,
        }
    }
}

/// Documents and images over the gateway
pub struct FileService {
    gateway: Arc<ApiGateway>,
}

impl FileService {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        FileService { gateway }
    }

    /// Validate, optionally compress, and upload one file for the given
    /// surface. `extra_fields` carries surface-specific metadata like the
    /// document category or the guarantee amount.
    pub async fn upload(
        &self,
        kind: DocumentKind,
        owner_id: &str,
        file: FileUpload,
        extra_fields: Vec<(String, String)>,
    ) -> ApiResult<Value> {
        kind.validate(&file, None)?;
        let file = if kind.compresses() {
            compress_image(file)
        } else {
            file
        };

        let mut fields = Vec::with_capacity(extra_fields.len() + 1);
        if let Some(owner_field) = kind.owner_field() {
            fields.push((owner_field.to_string(), owner_id.to_string()));
        }
        fields.extend(extra_fields);

        self.gateway
            .upload(
                &kind.upload_endpoint(owner_id),
                UploadRequest {
                    file_name: file.file_name,
                    content_type: file.content_type,
                    bytes: file.bytes,
                    fields,
                },
            )
            .await
    }

    /// Upload returning the created document record
    pub async fn upload_documento(
        &self,
        kind: DocumentKind,
        owner_id: &str,
        file: FileUpload,
        extra_fields: Vec<(String, String)>,
    ) -> ApiResult<Documento> {
        let body = self.upload(kind, owner_id, file, extra_fields).await?;
        decode(body)
    }

    pub async fn list(&self, kind: DocumentKind, owner_id: &str) -> ApiResult<Vec<Documento>> {
        let Some(endpoint) = kind.list_endpoint(owner_id) else {
            return Err(ApiError::Validation(format!(
                "{kind:?} does not support listing"
            )));
        };
        let body = self.gateway.get(&endpoint).await?;
        decode(body)
    }

    pub async fn download(
        &self,
        kind: DocumentKind,
        documento_id: &str,
    ) -> ApiResult<DownloadedFile> {
        let Some(endpoint) = kind.download_endpoint(documento_id) else {
            return Err(ApiError::Validation(format!(
                "{kind:?} does not support download by id"
            )));
        };
        self.gateway.download(&endpoint).await
    }

    /// Delete a file after the confirmation callback approves it. Returns
    /// `false` when the user declined; nothing is sent in that case.
    pub async fn delete(
        &self,
        kind: DocumentKind,
        documento_id: &str,
        confirm: impl Fn() -> bool,
    ) -> ApiResult<bool> {
        let Some(endpoint) = kind.delete_endpoint(documento_id) else {
            return Err(ApiError::Validation(format!(
                "{kind:?} does not support deletion"
            )));
        };
        if !confirm() {
            return Ok(false);
        }
        self.gateway.delete(&endpoint).await?;
        info!(documento_id, "file deleted");
        Ok(true)
    }

    /// Upload one gallery image for an article
    pub async fn upload_image(
        &self,
        articulo_id: &str,
        file: FileUpload,
        es_portada: bool,
    ) -> ApiResult<Documento> {
        let body = self
            .upload(
                DocumentKind::ArticuloImagen,
                articulo_id,
                file,
                vec![("esPortada".to_string(), es_portada.to_string())],
            )
            .await?;
        decode(body)
    }

    /// Upload a batch of gallery images strictly sequentially, reporting
    /// progress per file. The first image of an empty gallery becomes the
    /// cover. A failed file is recorded in the summary and the rest keep
    /// going.
    pub async fn upload_multiple_images(
        &self,
        articulo_id: &str,
        files: Vec<FileUpload>,
        gallery_is_empty: bool,
        mut on_progress: impl FnMut(UploadProgress),
    ) -> UploadSummary {
        let total = files.len();
        let mut results = Vec::with_capacity(total);

        for (index, file) in files.into_iter().enumerate() {
            let file_name = file.file_name.clone();
            on_progress(UploadProgress {
                current: index + 1,
                total,
                file_name: file_name.clone(),
                percentage: ((index * 100) / total.max(1)) as u8,
            });

            let es_portada = gallery_is_empty && index == 0;
            let result = self.upload_image(articulo_id, file, es_portada).await;
            results.push(UploadOutcome {
                file_name: file_name.clone(),
                result,
            });

            on_progress(UploadProgress {
                current: index + 1,
                total,
                file_name,
                percentage: (((index + 1) * 100) / total.max(1)) as u8,
            });
        }

        let total_uploaded = results.iter().filter(|o| o.result.is_ok()).count();
        UploadSummary {
            total_uploaded,
            total_failed: total - total_uploaded,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, mime: &str, len: usize) -> FileUpload {
        FileUpload {
            file_name: name.to_string(),
            content_type: mime.to_string(),
            bytes: vec![0u8; len],
        }
    }

    #[test]
    fn oversized_document_is_rejected_before_upload() {
        let file = upload("contrato.pdf", "application/pdf", 30 * 1024 * 1024);
        let err = validate_document_file(&file, None).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("25.0 MB"));

        let file = upload("contrato.pdf", "application/pdf", 24 * 1024 * 1024);
        assert!(validate_document_file(&file, None).is_ok());
    }

    #[test]
    fn image_validation_rejects_foreign_types() {
        let pdf = upload("scan.pdf", "application/pdf", 1024);
        assert!(validate_image_file(&pdf, None).is_err());

        let png = upload("foto.png", "image/png", 1024);
        assert!(validate_image_file(&png, None).is_ok());

        let shout = upload("FOTO.PNG", "IMAGE/PNG", 1024);
        assert!(validate_image_file(&shout, None).is_ok());
    }

    #[test]
    fn explicit_limit_overrides_default() {
        let file = upload("foto.jpg", "image/jpeg", 2048);
        assert!(validate_image_file(&file, Some(1024)).is_err());
        assert!(validate_image_file(&file, Some(4096)).is_ok());
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(file_extension("Foto.JPG").as_deref(), Some("jpg"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("sin_extension"), None);
        assert_eq!(file_extension(".hidden"), None);
    }

    #[test]
    fn file_sizes_format_with_one_decimal() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(25 * 1024 * 1024), "25.0 MB");
    }

    #[test]
    fn small_images_skip_compression() {
        let file = upload("foto.png", "image/png", 512 * 1024);
        let out = compress_image(file.clone());
        assert_eq!(out.bytes.len(), file.bytes.len());
        assert_eq!(out.content_type, "image/png");
    }

    #[test]
    fn undecodable_large_file_passes_through() {
        // over the threshold but not a real image
        let file = upload("foto.jpg", "image/jpeg", 2 * 1024 * 1024);
        let out = compress_image(file.clone());
        assert_eq!(out.bytes.len(), file.bytes.len());
        assert_eq!(out.file_name, "foto.jpg");
    }

    #[test]
    fn kinds_route_to_their_controllers() {
        assert_eq!(
            DocumentKind::ArticuloDocumento.upload_endpoint("ignored"),
            "/api/Articulos/PostDocumentoArticulo"
        );
        assert_eq!(
            DocumentKind::ArticuloImagen.upload_endpoint("abc-1"),
            "/api/Vendedor/SubirArchivo/abc-1"
        );
        assert_eq!(
            DocumentKind::CompradorDocumento { admin: false }.upload_endpoint(""),
            "/api/InfoComprador/PostDocumentoComprador"
        );
        assert_eq!(
            DocumentKind::CompradorDocumento { admin: true }.upload_endpoint(""),
            "/api/Compradores/PostDocumentoComprador"
        );
        assert_eq!(
            DocumentKind::Garantia { admin: false }.upload_endpoint(""),
            "/api/CompradorGarantias/PostGarantia"
        );
    }

    #[test]
    fn owner_fields_match_each_surface() {
        assert_eq!(DocumentKind::ArticuloImagen.owner_field(), None);
        assert_eq!(
            DocumentKind::ArticuloDocumento.owner_field(),
            Some("articuloID")
        );
        assert_eq!(
            DocumentKind::CompradorDocumento { admin: false }.owner_field(),
            Some("compradorID")
        );
        assert_eq!(DocumentKind::ClienteDocumento.owner_field(), Some("clienteID"));
    }

    #[test]
    fn image_kind_uses_the_image_rule() {
        let pdf = upload("scan.pdf", "application/pdf", 1024);
        assert!(DocumentKind::ArticuloImagen.validate(&pdf, None).is_err());
        assert!(DocumentKind::ArticuloDocumento.validate(&pdf, None).is_ok());
        assert!(DocumentKind::ArticuloImagen.compresses());
        assert!(!DocumentKind::Garantia { admin: false }.compresses());
    }

    #[test]
    fn garantia_download_requires_numeric_id() {
        let kind = DocumentKind::Garantia { admin: false };
        assert_eq!(
            kind.download_endpoint("42").as_deref(),
            Some("/api/CompradorGarantias/GetGarantiaFile/42")
        );
        assert_eq!(kind.download_endpoint("not-a-number"), None);
        assert_eq!(kind.delete_endpoint("42"), None);
    }

    #[test]
    fn self_service_listing_ignores_owner() {
        assert_eq!(
            DocumentKind::CompradorDocumento { admin: false }
                .list_endpoint("ignored")
                .as_deref(),
            Some("/api/InfoComprador/GetCompradorDocumentos")
        );
        assert_eq!(DocumentKind::Pago { admin: false }.list_endpoint(""), None);
    }
}
