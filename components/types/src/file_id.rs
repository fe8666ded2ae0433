/// A blob file id of the form `"<volume>,<needle>"`.
pub type FileId = String;

/// Extract the volume id from a blob file id: everything before the last
/// comma. A file id without a comma (or with nothing before it) is its own
/// volume id.
pub fn volume_id(file_id: &str) -> &str {
    match file_id.rfind(',') {
        Some(idx) if idx > 0 => &file_id[..idx],
        _ => file_id,
    }
}
