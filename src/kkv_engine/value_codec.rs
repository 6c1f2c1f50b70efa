use crate::kkv_engine::status::Status;

/// Decode-and-re-encode seam between incoming document payloads and the
/// segment's stored value form.
///
/// The production pack/attribute encoder lives outside this crate; the
/// engine only requires that a codec turns the wire payload into the bytes
/// the value arena should hold.
pub trait ValueCodec: Send + Sync {
    /// Re-encodes `raw` into `out` (cleared first).
    ///
    /// # Returns
    /// - `Err(Status::Corruption)` if `raw` is not decodable.
    fn encode(&self, raw: &[u8], out: &mut Vec<u8>) -> Result<(), Status>;
}

/// Pass-through codec: stores payloads byte-for-byte.
#[derive(Debug, Default)]
pub struct PlainValueCodec;

impl ValueCodec for PlainValueCodec {
    fn encode(&self, raw: &[u8], out: &mut Vec<u8>) -> Result<(), Status> {
        out.clear();
        out.extend_from_slice(raw);
        Ok(())
    }
}
