//! OpenPGP key normalization
//!
//! APT source keys arrive from key servers and arbitrary URLs in either
//! ASCII-armored or binary form. They are parsed with sequoia and always
//! written back as armored text with carriage returns stripped, which is
//! what cloud-init expects under `apt.sources.<name>.key`.

use log::debug;
use openpgp::armor::{Kind, Reader, ReaderMode};
use openpgp::parse::Parse;
use openpgp::serialize::SerializeInto;
use openpgp::Cert;
use sequoia_openpgp as openpgp;

use crate::error::{Error, Result};

/// Parse `data` as an OpenPGP certificate and return its armored form
///
/// Armored parsing is tried first, then binary. `reference` (the key id or
/// URL the data came from) only appears in error messages.
pub fn normalize_key(reference: &str, data: &[u8]) -> Result<String> {
    let cert = parse_cert(reference, data)?;
    debug!("Parsed key {} ({})", reference, cert.fingerprint());

    let armored = cert.armored().to_vec().map_err(|e| Error::KeyParse {
        reference: reference.to_string(),
        message: format!("failed to armor certificate: {e}"),
    })?;
    let text = String::from_utf8(armored).map_err(|e| Error::KeyParse {
        reference: reference.to_string(),
        message: e.to_string(),
    })?;
    Ok(text.replace('\r', ""))
}

fn parse_cert(reference: &str, data: &[u8]) -> Result<Cert> {
    let armored = Reader::from_bytes(data, ReaderMode::Tolerant(Some(Kind::PublicKey)));
    match Cert::from_reader(armored) {
        Ok(cert) => Ok(cert),
        Err(armor_err) => {
            debug!(
                "Key {} is not armored ({}), trying binary",
                reference, armor_err
            );
            Cert::from_bytes(data).map_err(|e| Error::KeyParse {
                reference: reference.to_string(),
                message: e.to_string(),
            })
        }
    }
}
