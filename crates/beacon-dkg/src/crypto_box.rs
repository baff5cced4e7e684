//! Peer-key-encrypted share delivery. Each dealer encrypts a
//! recipient's share under a key derived from an ephemeral X25519
//! exchange with the recipient's long-term key, then seals it with
//! `xsalsa20poly1305` — the same AEAD `key_management::keystore` uses
//! for passphrase-encrypted keystores, with the key derived from an
//! ECDH exchange instead of Argon2id over a passphrase.
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use xsalsa20poly1305::aead::{Aead, KeyInit};
use xsalsa20poly1305::{Nonce, XSalsa20Poly1305};

use crate::error::Error;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SealedShare {
    pub ephemeral_public: [u8; 32],
    pub nonce: [u8; 24],
    pub ciphertext: Vec<u8>,
}

fn derive_key(shared_secret: &x25519_dalek::SharedSecret) -> [u8; 32] {
    Sha256::digest(shared_secret.as_bytes()).into()
}

pub fn seal(recipient_public: &PublicKey, plaintext: &[u8]) -> SealedShare {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(recipient_public);
    let key = derive_key(&shared);
    let cipher = XSalsa20Poly1305::new((&key).into());
    let mut nonce_bytes = [0u8; 24];
    rand::RngCore::fill_bytes(&mut OsRng, &mut nonce_bytes);
    let nonce = Nonce::from(nonce_bytes);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .expect("encryption over an unbounded plaintext buffer cannot fail");
    SealedShare {
        ephemeral_public: ephemeral_public.to_bytes(),
        nonce: nonce_bytes,
        ciphertext,
    }
}

pub fn open(recipient_secret: &StaticSecret, sealed: &SealedShare) -> Result<Vec<u8>, Error> {
    let ephemeral_public = PublicKey::from(sealed.ephemeral_public);
    let shared = recipient_secret.diffie_hellman(&ephemeral_public);
    let key = derive_key(&shared);
    let cipher = XSalsa20Poly1305::new((&key).into());
    let nonce = Nonce::from(sealed.nonce);
    cipher
        .decrypt(&nonce, sealed.ciphertext.as_slice())
        .map_err(|_| Error::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        let sealed = seal(&public, b"a share of a polynomial");
        let opened = open(&secret, &sealed).unwrap();
        assert_eq!(opened, b"a share of a polynomial");
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let public = PublicKey::from(&StaticSecret::random_from_rng(OsRng));
        let sealed = seal(&public, b"payload");
        let other_secret = StaticSecret::random_from_rng(OsRng);
        assert!(open(&other_secret, &sealed).is_err());
    }
}
