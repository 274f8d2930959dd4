use std::path::Path;

/// Content type used when the extension is missing or unknown.
pub const FALLBACK_CONTENT_TYPE: &str = "application/text";

/// Resolves a content type from the file extension. Text types carry a
/// UTF-8 charset.
pub fn content_type_for(path: &Path) -> String {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return FALLBACK_CONTENT_TYPE.to_string();
    };
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => mime::TEXT_HTML_UTF_8.to_string(),
        "css" => mime::TEXT_CSS_UTF_8.to_string(),
        "js" | "mjs" => mime::TEXT_JAVASCRIPT.to_string() + "; charset=utf-8",
        "json" | "map" => mime::APPLICATION_JSON.to_string() + "; charset=utf-8",
        "txt" => mime::TEXT_PLAIN_UTF_8.to_string(),
        "csv" => mime::TEXT_CSV_UTF_8.to_string(),
        "xml" => mime::TEXT_XML.to_string() + "; charset=utf-8",
        "svg" => mime::IMAGE_SVG.to_string(),
        "png" => mime::IMAGE_PNG.to_string(),
        "jpg" | "jpeg" => mime::IMAGE_JPEG.to_string(),
        "gif" => mime::IMAGE_GIF.to_string(),
        "bmp" => mime::IMAGE_BMP.to_string(),
        "ico" => "image/vnd.microsoft.icon".to_string(),
        "webp" => "image/webp".to_string(),
        "woff" => mime::FONT_WOFF.to_string(),
        "woff2" => mime::FONT_WOFF2.to_string(),
        "pdf" => mime::APPLICATION_PDF.to_string(),
        "wasm" => "application/wasm".to_string(),
        "md" => "text/markdown; charset=utf-8".to_string(),
        _ => FALLBACK_CONTENT_TYPE.to_string(),
    }
}
