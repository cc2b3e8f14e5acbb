//! Reversible obfuscation of sensitive transaction fields.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hkdf::Hkdf;
use sha2::Sha256;
use tracing::warn;
use zeroize::ZeroizeOnDrop;

const KEYSTREAM_INFO: &[u8] = b"billingkit obfuscation v1";
const BLOCK_LEN: usize = 32;

/// Salt-keyed, deterministic, invertible transform for the fields the ledger
/// persists (order id, item id, developer payload).
///
/// The same input always obfuscates to the same output under a given salt, so
/// equality queries keep working against stored ciphertext. Without a salt
/// the codec passes values through unchanged; the ledger surfaces one warning
/// per access in that case, via [`ObfuscationCodec::warn_unkeyed`].
#[derive(ZeroizeOnDrop)]
pub struct ObfuscationCodec {
    salt: Option<Vec<u8>>,
}

impl std::fmt::Debug for ObfuscationCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObfuscationCodec")
            .field("keyed", &self.is_keyed())
            .finish()
    }
}

impl ObfuscationCodec {
    /// Creates a codec; `None` yields the pass-through codec.
    #[must_use]
    pub const fn new(salt: Option<Vec<u8>>) -> Self {
        Self { salt }
    }

    /// Returns true when a salt is configured.
    #[must_use]
    pub const fn is_keyed(&self) -> bool {
        self.salt.is_some()
    }

    /// Logs the missing-salt warning. The ledger calls this once per access,
    /// not once per field.
    pub(crate) fn warn_unkeyed() {
        warn!("no obfuscation salt configured; transaction fields are stored in plaintext");
    }

    /// Obfuscates one field value.
    #[must_use]
    pub fn obfuscate(&self, value: &str) -> String {
        self.salt.as_ref().map_or_else(
            || value.to_owned(),
            |salt| BASE64.encode(xor_keystream(salt, value.as_bytes())),
        )
    }

    /// Reverses [`ObfuscationCodec::obfuscate`].
    ///
    /// A value that does not decode as obfuscated text (rows written before a
    /// salt was configured) is returned unchanged.
    #[must_use]
    pub fn unobfuscate(&self, value: &str) -> String {
        let Some(salt) = self.salt.as_ref() else {
            return value.to_owned();
        };
        let Ok(raw) = BASE64.decode(value) else {
            return value.to_owned();
        };
        String::from_utf8(xor_keystream(salt, &raw)).unwrap_or_else(|_| value.to_owned())
    }
}

/// XORs `data` with a keystream expanded from `salt`, block by block. The
/// per-block expansion keeps each HKDF output within its 255-block bound
/// regardless of the input length.
fn xor_keystream(salt: &[u8], data: &[u8]) -> Vec<u8> {
    let hkdf = Hkdf::<Sha256>::new(None, salt);
    let mut out = Vec::with_capacity(data.len());
    let mut block = [0u8; BLOCK_LEN];
    for (index, chunk) in data.chunks(BLOCK_LEN).enumerate() {
        let mut info = KEYSTREAM_INFO.to_vec();
        info.extend_from_slice(&(index as u64).to_le_bytes());
        hkdf.expand(&info, &mut block)
            .expect("a single block is always within the hkdf output bound");
        out.extend(chunk.iter().zip(block.iter()).map(|(d, k)| d ^ k));
    }
    out
}
