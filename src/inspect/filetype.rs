//! Content-type sniffing from raw bytes.
//!
//! Upload filenames and client-supplied MIME types lie; the first bytes do
//! not. A PDF is identified by the `%PDF-` marker, which the ISO spec allows
//! to appear after up to 1024 bytes of preamble junk (some generators emit a
//! BOM or printer prologue first). Everything else is classified just well
//! enough to produce a useful rejection message.

/// Best-effort MIME classification of an upload.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if is_pdf(bytes) {
        return "application/pdf";
    }
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'P', b'K', 0x03, 0x04, ..] => "application/zip",
        [b'%', b'!', b'P', b'S', ..] => "application/postscript",
        [b'{', ..] | [b'[', ..] => "application/json",
        [b'<', ..] => "text/html",
        _ if !bytes.is_empty() && bytes.iter().take(512).all(|b| b.is_ascii() && *b != 0) => {
            "text/plain"
        }
        _ => "application/octet-stream",
    }
}

/// Whether the buffer is PDF content: `%PDF-` within the first 1024 bytes.
pub fn is_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(1024)];
    window.windows(5).any(|w| w == b"%PDF-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_pdf_header() {
        assert!(is_pdf(b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n"));
        assert_eq!(sniff_mime(b"%PDF-1.4 rest"), "application/pdf");
    }

    #[test]
    fn pdf_marker_after_preamble_junk() {
        let mut bytes = vec![b' '; 100];
        bytes.extend_from_slice(b"%PDF-1.5\n");
        assert!(is_pdf(&bytes));
    }

    #[test]
    fn pdf_marker_past_1024_bytes_is_rejected() {
        let mut bytes = vec![0u8; 1500];
        bytes.extend_from_slice(b"%PDF-1.5");
        assert!(!is_pdf(&bytes));
    }

    #[test]
    fn non_pdf_classification() {
        assert_eq!(sniff_mime(&[0x89, b'P', b'N', b'G', 0x0D]), "image/png");
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_mime(b"PK\x03\x04word/"), "application/zip");
        assert_eq!(sniff_mime(b"hello world"), "text/plain");
        assert_eq!(sniff_mime(&[0x00, 0x01, 0x02]), "application/octet-stream");
        assert_eq!(sniff_mime(b""), "application/octet-stream");
    }
}
