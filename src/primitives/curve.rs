//! `EcCurve` contract (§6.2): `{ field_byte_length, generate_keypair, ecdh_with_cofactor }`.
//!
//! Two curve families back UM1 key agreement (C7): Curve25519 (via
//! `x25519-dalek`, cofactor clearing is inherent to X25519 — see the §4.6
//! edge case) and NIST P-256 / secp256r1 (via `p256`).

use p256::ecdh::diffie_hellman as p256_diffie_hellman;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey, StaticSecret as X25519Secret};

use crate::error::{Error, Result};
use crate::primitives::CurveKind;

#[derive(Clone)]
pub enum CurvePublicKey {
    Curve25519(X25519PublicKey),
    Secp256r1(p256::PublicKey),
}

impl CurvePublicKey {
    pub fn kind(&self) -> CurveKind {
        match self {
            Self::Curve25519(_) => CurveKind::Curve25519,
            Self::Secp256r1(_) => CurveKind::Secp256r1,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Curve25519(pk) => pk.as_bytes().to_vec(),
            Self::Secp256r1(pk) => pk.to_encoded_point(true).as_bytes().to_vec(),
        }
    }

    pub fn from_bytes(kind: CurveKind, bytes: &[u8]) -> Result<Self> {
        match kind {
            CurveKind::Curve25519 => {
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| Error::FormatInvalid("invalid Curve25519 public key length"))?;
                Ok(Self::Curve25519(X25519PublicKey::from(arr)))
            }
            CurveKind::Secp256r1 => {
                let pk = p256::PublicKey::from_sec1_bytes(bytes)
                    .map_err(|_| Error::FormatInvalid("invalid secp256r1 public key encoding"))?;
                Ok(Self::Secp256r1(pk))
            }
        }
    }
}

pub enum CurveSecretKey {
    Curve25519(X25519Secret),
    Secp256r1(p256::SecretKey),
}

impl CurveSecretKey {
    pub fn kind(&self) -> CurveKind {
        match self {
            Self::Curve25519(_) => CurveKind::Curve25519,
            Self::Secp256r1(_) => CurveKind::Secp256r1,
        }
    }

    pub fn public_key(&self) -> CurvePublicKey {
        match self {
            Self::Curve25519(sk) => CurvePublicKey::Curve25519(X25519PublicKey::from(sk)),
            Self::Secp256r1(sk) => CurvePublicKey::Secp256r1(sk.public_key()),
        }
    }

    /// Raw scalar bytes, for at-rest storage. Callers are responsible for
    /// wiping the file and any in-memory copy once it is no longer needed.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Curve25519(sk) => sk.to_bytes().to_vec(),
            Self::Secp256r1(sk) => sk.to_bytes().to_vec(),
        }
    }

    pub fn from_bytes(kind: CurveKind, bytes: &[u8]) -> Result<Self> {
        match kind {
            CurveKind::Curve25519 => {
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| Error::FormatInvalid("invalid Curve25519 secret key length"))?;
                Ok(Self::Curve25519(X25519Secret::from(arr)))
            }
            CurveKind::Secp256r1 => {
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| Error::FormatInvalid("invalid secp256r1 secret key length"))?;
                let sk = p256::SecretKey::from_bytes(&arr.into())
                    .map_err(|_| Error::FormatInvalid("invalid secp256r1 secret key encoding"))?;
                Ok(Self::Secp256r1(sk))
            }
        }
    }
}

/// Generates a long-term (or ephemeral, via [`generate_ephemeral`]) keypair
/// on the named curve.
pub fn generate_keypair(kind: CurveKind) -> (CurvePublicKey, CurveSecretKey) {
    match kind {
        CurveKind::Curve25519 => {
            let secret = X25519Secret::random_from_rng(OsRng);
            let public = X25519PublicKey::from(&secret);
            (
                CurvePublicKey::Curve25519(public),
                CurveSecretKey::Curve25519(secret),
            )
        }
        CurveKind::Secp256r1 => {
            let secret = p256::SecretKey::random(&mut OsRng);
            let public = secret.public_key();
            (
                CurvePublicKey::Secp256r1(public),
                CurveSecretKey::Secp256r1(secret),
            )
        }
    }
}

/// Generates a fresh X25519 ephemeral secret (consumed on use, no `Clone`).
pub fn generate_ephemeral_x25519() -> (X25519PublicKey, EphemeralSecret) {
    let secret = EphemeralSecret::random_from_rng(OsRng);
    let public = X25519PublicKey::from(&secret);
    (public, secret)
}

/// `ECDH-with-cofactor`: for Curve25519 this is plain X25519 (cofactor
/// clearing is inherent to scalar clamping, per the §4.6 edge case); for
/// secp256r1 the cofactor is 1 and this is plain ECDH. Returns the shared
/// point's encoded x-coordinate, `field_byte_length()` bytes, no trimming.
pub fn ecdh_with_cofactor_x25519(public: &X25519PublicKey, secret: &X25519Secret) -> [u8; 32] {
    *secret.diffie_hellman(public).as_bytes()
}

pub fn ecdh_with_cofactor_x25519_ephemeral(
    public: &X25519PublicKey,
    secret: EphemeralSecret,
) -> [u8; 32] {
    *secret.diffie_hellman(public).as_bytes()
}

pub fn ecdh_with_cofactor_p256(public: &p256::PublicKey, secret: &p256::SecretKey) -> [u8; 32] {
    let shared = p256_diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
    let mut out = [0u8; 32];
    out.copy_from_slice(shared.raw_secret_bytes().as_slice());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x25519_ecdh_is_symmetric() {
        let (pub_a, sec_a) = generate_keypair(CurveKind::Curve25519);
        let (pub_b, sec_b) = generate_keypair(CurveKind::Curve25519);
        let (CurvePublicKey::Curve25519(pub_a), CurveSecretKey::Curve25519(sec_a)) =
            (pub_a, sec_a)
        else {
            unreachable!()
        };
        let (CurvePublicKey::Curve25519(pub_b), CurveSecretKey::Curve25519(sec_b)) =
            (pub_b, sec_b)
        else {
            unreachable!()
        };

        let shared_a = ecdh_with_cofactor_x25519(&pub_b, &sec_a);
        let shared_b = ecdh_with_cofactor_x25519(&pub_a, &sec_b);
        assert_eq!(shared_a, shared_b);
    }

    #[test]
    fn p256_ecdh_is_symmetric() {
        let (pub_a, sec_a) = generate_keypair(CurveKind::Secp256r1);
        let (pub_b, sec_b) = generate_keypair(CurveKind::Secp256r1);
        let (CurvePublicKey::Secp256r1(pub_a), CurveSecretKey::Secp256r1(sec_a)) = (pub_a, sec_a)
        else {
            unreachable!()
        };
        let (CurvePublicKey::Secp256r1(pub_b), CurveSecretKey::Secp256r1(sec_b)) = (pub_b, sec_b)
        else {
            unreachable!()
        };

        let shared_a = ecdh_with_cofactor_p256(&pub_b, &sec_a);
        let shared_b = ecdh_with_cofactor_p256(&pub_a, &sec_b);
        assert_eq!(shared_a, shared_b);
    }

    #[test]
    fn public_key_bytes_roundtrip() {
        let (pk, _sk) = generate_keypair(CurveKind::Curve25519);
        let bytes = pk.to_bytes();
        let back = CurvePublicKey::from_bytes(CurveKind::Curve25519, &bytes).unwrap();
        assert_eq!(back.to_bytes(), bytes);
    }
}
