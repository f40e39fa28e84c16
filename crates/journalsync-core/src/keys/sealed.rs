//! Anonymous sealed boxes over X25519
//!
//! Used to wrap the content key for a device public key. The sender needs no
//! key of its own: a fresh ephemeral X25519 key is generated per seal.
//!
//! ```text
//! 1. shared  = X25519(ephemeral_sk, recipient_pk)
//! 2. key     = HKDF-SHA256(ikm = shared, salt = ephemeral_pk || recipient_pk)
//! 3. sealed  = ephemeral_pk (32) || PayloadCrypto(key).encrypt(plaintext)
//! ```

use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};

use super::device::DeviceKeyMaterial;
use crate::crypto::{PayloadCrypto, KEY_SIZE, MIN_PAYLOAD_LEN};
use crate::error::SyncError;

/// Domain separation string for HKDF
const HKDF_INFO: &[u8] = b"journalsync-sealed-box-v1";

/// Size of the ephemeral public key prefix.
const EPHEMERAL_PK_SIZE: usize = 32;

/// Seal `plaintext` so only the holder of `recipient`'s secret key can open it.
pub fn seal(plaintext: &[u8], recipient: &PublicKey) -> Result<Vec<u8>, SyncError> {
    let ephemeral_secret = StaticSecret::from(PayloadCrypto::generate_key());
    let ephemeral_public = PublicKey::from(&ephemeral_secret);

    let shared = ephemeral_secret.diffie_hellman(recipient);
    if !shared.was_contributory() {
        return Err(SyncError::Crypto(
            "Recipient public key is a low-order point".to_string(),
        ));
    }
    let key = derive_key(shared.as_bytes(), &ephemeral_public, recipient)?;

    let mut sealed = ephemeral_public.as_bytes().to_vec();
    sealed.extend_from_slice(&PayloadCrypto::new(&key).encrypt(plaintext)?);
    Ok(sealed)
}

/// Open a box produced by [`seal`] with the recipient's keypair.
pub fn open(sealed: &[u8], recipient: &DeviceKeyMaterial) -> Result<Vec<u8>, SyncError> {
    if sealed.len() < EPHEMERAL_PK_SIZE + MIN_PAYLOAD_LEN {
        return Err(SyncError::DecryptionFailed(
            "Sealed box too short".to_string(),
        ));
    }

    let mut epk = [0u8; EPHEMERAL_PK_SIZE];
    epk.copy_from_slice(&sealed[..EPHEMERAL_PK_SIZE]);
    let ephemeral_public = PublicKey::from(epk);

    let shared = recipient.secret().diffie_hellman(&ephemeral_public);
    if !shared.was_contributory() {
        return Err(SyncError::DecryptionFailed(
            "Sealed box carries a low-order ephemeral key".to_string(),
        ));
    }
    let key = derive_key(shared.as_bytes(), &ephemeral_public, recipient.public_key())?;

    PayloadCrypto::new(&key).decrypt(&sealed[EPHEMERAL_PK_SIZE..])
}

fn derive_key(
    shared_secret: &[u8],
    ephemeral: &PublicKey,
    recipient: &PublicKey,
) -> Result<[u8; KEY_SIZE], SyncError> {
    let mut salt = [0u8; 64];
    salt[..32].copy_from_slice(ephemeral.as_bytes());
    salt[32..].copy_from_slice(recipient.as_bytes());

    let hkdf = Hkdf::<Sha256>::new(Some(&salt), shared_secret);
    let mut output = [0u8; KEY_SIZE];
    hkdf.expand(HKDF_INFO, &mut output)
        .map_err(|_| SyncError::Crypto("HKDF expand failed".to_string()))?;
    Ok(output)
}
