//! KeyAgreement (C7): UM1 one-pass unified-model EC key agreement. The
//! initiator combines an ephemeral-static and a static-static ECDH shared
//! secret to get forward secrecy out of a single message; the responder
//! reproduces the same value from the initiator's ephemeral public key.

use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::primitives::curve::{self, CurvePublicKey, CurveSecretKey};
use crate::primitives::CurveKind;

/// `Ze || Zs`, each encoded to the curve's field byte length with no
/// leading trim. Wiped on drop.
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Initiator side of UM1. Generates a fresh ephemeral keypair on
/// `sender_priv`'s curve, combines it with the long-term static secret, and
/// returns the shared secret plus the ephemeral public key to send to the
/// responder.
pub fn initiate(
    recipient_pub: &CurvePublicKey,
    sender_priv: &CurveSecretKey,
) -> Result<(SharedSecret, CurvePublicKey)> {
    if recipient_pub.kind() != sender_priv.kind() {
        return Err(Error::ConfigInvalid(
            "UM1 initiate: recipient and sender keys are on different curves",
        ));
    }
    match (recipient_pub, sender_priv) {
        (CurvePublicKey::Curve25519(recipient_pub), CurveSecretKey::Curve25519(sender_priv)) => {
            let (ephemeral_pub, ephemeral_priv) = curve::generate_ephemeral_x25519();
            let mut ze = curve::ecdh_with_cofactor_x25519_ephemeral(recipient_pub, ephemeral_priv);
            let mut zs = curve::ecdh_with_cofactor_x25519(recipient_pub, sender_priv);
            let mut combined = Vec::with_capacity(ze.len() + zs.len());
            combined.extend_from_slice(&ze);
            combined.extend_from_slice(&zs);
            ze.zeroize();
            zs.zeroize();
            Ok((SharedSecret(combined), CurvePublicKey::Curve25519(ephemeral_pub)))
        }
        (CurvePublicKey::Secp256r1(recipient_pub), CurveSecretKey::Secp256r1(sender_priv)) => {
            let (ephemeral_pub, ephemeral_priv) = curve::generate_keypair(CurveKind::Secp256r1);
            let CurveSecretKey::Secp256r1(ephemeral_priv) = ephemeral_priv else {
                unreachable!()
            };
            let mut ze = curve::ecdh_with_cofactor_p256(recipient_pub, &ephemeral_priv);
            let mut zs = curve::ecdh_with_cofactor_p256(recipient_pub, sender_priv);
            let mut combined = Vec::with_capacity(ze.len() + zs.len());
            combined.extend_from_slice(&ze);
            combined.extend_from_slice(&zs);
            ze.zeroize();
            zs.zeroize();
            Ok((SharedSecret(combined), ephemeral_pub))
        }
        _ => Err(Error::ConfigInvalid("UM1 initiate: curve mismatch")),
    }
}

/// Responder side of UM1. Reproduces the shared secret from the sender's
/// long-term public key, the responder's long-term private key, and the
/// ephemeral public key the initiator sent.
pub fn respond(
    sender_pub: &CurvePublicKey,
    recipient_priv: &CurveSecretKey,
    ephemeral_pub: &CurvePublicKey,
) -> Result<SharedSecret> {
    if sender_pub.kind() != recipient_priv.kind() || ephemeral_pub.kind() != recipient_priv.kind() {
        return Err(Error::ConfigInvalid(
            "UM1 respond: sender/recipient/ephemeral keys are not all on the same curve",
        ));
    }
    match (sender_pub, recipient_priv, ephemeral_pub) {
        (
            CurvePublicKey::Curve25519(sender_pub),
            CurveSecretKey::Curve25519(recipient_priv),
            CurvePublicKey::Curve25519(ephemeral_pub),
        ) => {
            let mut ze = curve::ecdh_with_cofactor_x25519(ephemeral_pub, recipient_priv);
            let mut zs = curve::ecdh_with_cofactor_x25519(sender_pub, recipient_priv);
            let mut combined = Vec::with_capacity(ze.len() + zs.len());
            combined.extend_from_slice(&ze);
            combined.extend_from_slice(&zs);
            ze.zeroize();
            zs.zeroize();
            Ok(SharedSecret(combined))
        }
        (
            CurvePublicKey::Secp256r1(sender_pub),
            CurveSecretKey::Secp256r1(recipient_priv),
            CurvePublicKey::Secp256r1(ephemeral_pub),
        ) => {
            let mut ze = curve::ecdh_with_cofactor_p256(ephemeral_pub, recipient_priv);
            let mut zs = curve::ecdh_with_cofactor_p256(sender_pub, recipient_priv);
            let mut combined = Vec::with_capacity(ze.len() + zs.len());
            combined.extend_from_slice(&ze);
            combined.extend_from_slice(&zs);
            ze.zeroize();
            zs.zeroize();
            Ok(SharedSecret(combined))
        }
        _ => Err(Error::ConfigInvalid("UM1 respond: curve mismatch")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x25519_initiate_and_respond_agree() {
        let (sender_pub, sender_priv) = curve::generate_keypair(CurveKind::Curve25519);
        let (recipient_pub, recipient_priv) = curve::generate_keypair(CurveKind::Curve25519);

        let (initiator_secret, ephemeral_pub) = initiate(&recipient_pub, &sender_priv).unwrap();
        let responder_secret = respond(&sender_pub, &recipient_priv, &ephemeral_pub).unwrap();

        assert_eq!(initiator_secret.as_bytes(), responder_secret.as_bytes());
        assert_eq!(initiator_secret.as_bytes().len(), 64);
    }

    #[test]
    fn p256_initiate_and_respond_agree() {
        let (sender_pub, sender_priv) = curve::generate_keypair(CurveKind::Secp256r1);
        let (recipient_pub, recipient_priv) = curve::generate_keypair(CurveKind::Secp256r1);

        let (initiator_secret, ephemeral_pub) = initiate(&recipient_pub, &sender_priv).unwrap();
        let responder_secret = respond(&sender_pub, &recipient_priv, &ephemeral_pub).unwrap();

        assert_eq!(initiator_secret.as_bytes(), responder_secret.as_bytes());
    }

    #[test]
    fn mismatched_curves_rejected() {
        let (_, sender_priv) = curve::generate_keypair(CurveKind::Curve25519);
        let (recipient_pub, _) = curve::generate_keypair(CurveKind::Secp256r1);
        assert!(matches!(
            initiate(&recipient_pub, &sender_priv),
            Err(Error::ConfigInvalid(_))
        ));
    }
}
