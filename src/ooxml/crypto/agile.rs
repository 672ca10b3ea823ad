//! MS-OFFCRYPTO Agile encryption (AES-128-CBC, SHA-1 key derivation).
use super::{EncryptedParts, PackageCipher, fill_random, password_to_utf16le};
use crate::common::error::{Error, Result};
use crate::common::xml::{XmlDocument, XmlElement};
use aes::Aes128;
use aes::cipher::{
    BlockDecryptMut, BlockEncryptMut, KeyIvInit,
    block_padding::{NoPadding, Pkcs7},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};
use tracing::debug;

const AGILE_BLOCK_SIZE: usize = 16;
const AGILE_KEY_BITS: u32 = 128;
const AGILE_KEY_BYTES: usize = (AGILE_KEY_BITS as usize) / 8;
const AGILE_HASH_SIZE: usize = 20; // SHA‑1
pub const AGILE_SPIN_COUNT: u32 = 100_000;
const AGILE_SEGMENT_SIZE: usize = 4096;
const AGILE_ENCRYPTION_VERSION_MAJOR: u16 = 4;
const AGILE_ENCRYPTION_VERSION_MINOR: u16 = 4;
const AGILE_ENCRYPTION_FLAGS: u32 = 0x0000_0040;

const K_VERIFIER_INPUT_BLOCK: [u8; 8] = [0xfe, 0xa7, 0xd2, 0x76, 0x3b, 0x4b, 0x9e, 0x79];
const K_HASHED_VERIFIER_BLOCK: [u8; 8] = [0xd7, 0xaa, 0x0f, 0x6d, 0x30, 0x61, 0x34, 0x4e];
const K_CRYPTO_KEY_BLOCK: [u8; 8] = [0x14, 0x6e, 0x0b, 0xe7, 0xab, 0xac, 0xd0, 0xd6];
const K_INTEGRITY_KEY_BLOCK: [u8; 8] = [0x5f, 0xb2, 0xad, 0x01, 0x0c, 0xb9, 0xe1, 0xf6];
const K_INTEGRITY_VALUE_BLOCK: [u8; 8] = [0xa0, 0x67, 0x7f, 0x02, 0xb2, 0x2c, 0x84, 0x33];

type HmacSha1 = Hmac<Sha1>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Agile password encryption with a configurable key-derivation spin count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgileCipher {
    pub spin_count: u32,
}

impl Default for AgileCipher {
    fn default() -> Self {
        Self {
            spin_count: AGILE_SPIN_COUNT,
        }
    }
}

impl PackageCipher for AgileCipher {
    fn encrypt(&self, package_bytes: &[u8], password: &str) -> Result<EncryptedParts> {
        if package_bytes.is_empty() {
            return Err(Error::InvalidArgument("cannot encrypt an empty package".to_string()));
        }

        let mut verifier_salt = [0u8; AGILE_BLOCK_SIZE];
        let mut verifier = [0u8; AGILE_BLOCK_SIZE];
        let mut key_salt = [0u8; AGILE_BLOCK_SIZE];
        let mut content_key = [0u8; AGILE_KEY_BYTES];
        let mut integrity_salt = [0u8; AGILE_HASH_SIZE];
        fill_random(&mut verifier_salt, "verifier salt")?;
        fill_random(&mut verifier, "verifier")?;
        fill_random(&mut key_salt, "key salt")?;
        fill_random(&mut content_key, "content key")?;
        fill_random(&mut integrity_salt, "integrity salt")?;

        let pw_hash = hash_password_agile(password, &verifier_salt, self.spin_count);

        let encrypted_verifier =
            hash_input_agile(&verifier_salt, &pw_hash, &K_VERIFIER_INPUT_BLOCK, &verifier)?;
        let verifier_hash = Sha1::digest(verifier).to_vec();
        let encrypted_verifier_hash =
            hash_input_agile(&verifier_salt, &pw_hash, &K_HASHED_VERIFIER_BLOCK, &verifier_hash)?;
        let encrypted_key =
            hash_input_agile(&verifier_salt, &pw_hash, &K_CRYPTO_KEY_BLOCK, &content_key)?;

        let encrypted_package = encrypt_package_stream(&content_key, &key_salt, package_bytes)?;

        // The integrity salt is the HMAC key; it is zero-padded only for AES.
        let integrity_salt_padded = pad_zero_to_block_multiple(&integrity_salt, AGILE_BLOCK_SIZE);
        let iv_hmac_key = generate_iv_agile(&key_salt, Some(&K_INTEGRITY_KEY_BLOCK));
        let encrypted_hmac_key = Aes128CbcEnc::new_from_slices(&content_key, &iv_hmac_key)
            .map_err(|_| Error::InvalidArgument("invalid AES key/iv for integrity key".into()))?
            .encrypt_padded_vec_mut::<NoPadding>(&integrity_salt_padded);

        let hmac_value = hmac_sha1(&integrity_salt, &encrypted_package)?;
        let hmac_value_padded = pad_zero_to_block_multiple(&hmac_value, AGILE_BLOCK_SIZE);
        let iv_hmac_value = generate_iv_agile(&key_salt, Some(&K_INTEGRITY_VALUE_BLOCK));
        let encrypted_hmac_value = Aes128CbcEnc::new_from_slices(&content_key, &iv_hmac_value)
            .map_err(|_| Error::InvalidArgument("invalid AES key/iv for integrity value".into()))?
            .encrypt_padded_vec_mut::<NoPadding>(&hmac_value_padded);

        let xml = build_agile_encryption_info_xml(&InfoFields {
            key_salt: &key_salt,
            verifier_salt: &verifier_salt,
            encrypted_verifier: &encrypted_verifier,
            encrypted_verifier_hash: &encrypted_verifier_hash,
            encrypted_key: &encrypted_key,
            encrypted_hmac_key: &encrypted_hmac_key,
            encrypted_hmac_value: &encrypted_hmac_value,
            spin_count: self.spin_count,
        });
        let xml_bytes = xml.into_bytes();

        let mut encryption_info = Vec::with_capacity(8 + xml_bytes.len());
        encryption_info.extend_from_slice(&AGILE_ENCRYPTION_VERSION_MAJOR.to_le_bytes());
        encryption_info.extend_from_slice(&AGILE_ENCRYPTION_VERSION_MINOR.to_le_bytes());
        encryption_info.extend_from_slice(&AGILE_ENCRYPTION_FLAGS.to_le_bytes());
        encryption_info.extend_from_slice(&xml_bytes);

        debug!(
            spin_count = self.spin_count,
            plain = package_bytes.len(),
            encrypted = encrypted_package.len(),
            "encrypted package"
        );
        Ok(EncryptedParts {
            info: encryption_info,
            package: encrypted_package,
        })
    }

    fn decrypt(&self, info: &[u8], package: &[u8], password: &str) -> Result<Vec<u8>> {
        let params = AgileParams::parse(info)?;

        let pw_hash = hash_password_agile(password, &params.verifier_salt, params.spin_count);
        let verifier = decrypt_hash_input(
            &params.verifier_salt,
            &pw_hash,
            &K_VERIFIER_INPUT_BLOCK,
            &params.encrypted_verifier,
        )?;
        let verifier_hash = decrypt_hash_input(
            &params.verifier_salt,
            &pw_hash,
            &K_HASHED_VERIFIER_BLOCK,
            &params.encrypted_verifier_hash,
        )?;
        let expected = Sha1::digest(truncated(&verifier, AGILE_BLOCK_SIZE)?);
        if truncated(&verifier_hash, AGILE_HASH_SIZE)? != expected.as_slice() {
            return Err(Error::BadPassword);
        }

        let key = decrypt_hash_input(
            &params.verifier_salt,
            &pw_hash,
            &K_CRYPTO_KEY_BLOCK,
            &params.encrypted_key,
        )?;
        let content_key = truncated(&key, AGILE_KEY_BYTES)?;

        let iv_hmac_key = generate_iv_agile(&params.key_salt, Some(&K_INTEGRITY_KEY_BLOCK));
        let hmac_key = aes_decrypt(content_key, &iv_hmac_key, &params.encrypted_hmac_key)?;
        let iv_hmac_value = generate_iv_agile(&params.key_salt, Some(&K_INTEGRITY_VALUE_BLOCK));
        let hmac_value = aes_decrypt(content_key, &iv_hmac_value, &params.encrypted_hmac_value)?;
        let actual = hmac_sha1(truncated(&hmac_key, AGILE_HASH_SIZE)?, package)?;
        if actual.as_slice() != truncated(&hmac_value, AGILE_HASH_SIZE)? {
            return Err(Error::CorruptPackage(
                "encrypted package failed its integrity check".to_string(),
            ));
        }

        decrypt_package_stream(content_key, &params.key_salt, package)
    }
}

fn truncated(bytes: &[u8], len: usize) -> Result<&[u8]> {
    bytes
        .get(..len)
        .ok_or_else(|| Error::CorruptPackage("encryption record field is too short".to_string()))
}

fn hmac_sha1(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|e| Error::InvalidArgument(format!("failed to init HMAC-SHA1: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn hash_password_agile(password: &str, salt: &[u8], spin_count: u32) -> Vec<u8> {
    let mut sha = Sha1::new();
    sha.update(salt);
    sha.update(password_to_utf16le(password));
    let mut hash = sha.finalize().to_vec();

    for i in 0..spin_count {
        let mut sha = Sha1::new();
        // iteratorFirst: H(iterator || hash)
        sha.update(i.to_le_bytes());
        sha.update(&hash);
        hash = sha.finalize().to_vec();
    }

    hash
}

fn generate_key_agile(password_hash: &[u8], block_key: &[u8]) -> Vec<u8> {
    let mut sha = Sha1::new();
    sha.update(password_hash);
    sha.update(block_key);
    let key = sha.finalize().to_vec(); // H(H_n || blockKey)

    // pad/truncate with 0x36 to key size
    let mut out = vec![0x36u8; AGILE_KEY_BYTES];
    let copy = out.len().min(key.len());
    out[..copy].copy_from_slice(&key[..copy]);
    out
}

fn generate_iv_agile(key_salt: &[u8], block_key: Option<&[u8]>) -> Vec<u8> {
    let mut iv = match block_key {
        Some(block_key) => {
            let mut sha = Sha1::new();
            sha.update(key_salt);
            sha.update(block_key);
            sha.finalize().to_vec()
        },
        None => key_salt.to_vec(),
    };
    iv.resize(AGILE_BLOCK_SIZE, 0x36);
    iv
}

fn pad_zero_to_block_multiple(input: &[u8], block_size: usize) -> Vec<u8> {
    if input.is_empty() {
        return vec![0u8; block_size];
    }
    let mut out = Vec::from(input);
    let rem = out.len() % block_size;
    if rem != 0 {
        out.resize(out.len() + (block_size - rem), 0);
    }
    out
}

fn hash_input_agile(
    verifier_salt: &[u8],
    pw_hash: &[u8],
    block_key: &[u8],
    input: &[u8],
) -> Result<Vec<u8>> {
    let inter_key = generate_key_agile(pw_hash, block_key);
    let iv = generate_iv_agile(verifier_salt, None);
    let cipher = Aes128CbcEnc::new_from_slices(&inter_key, &iv)
        .map_err(|_| Error::InvalidArgument("invalid AES-128 key/iv".into()))?;
    Ok(cipher.encrypt_padded_vec_mut::<NoPadding>(&pad_zero_to_block_multiple(input, AGILE_BLOCK_SIZE)))
}

fn decrypt_hash_input(
    verifier_salt: &[u8],
    pw_hash: &[u8],
    block_key: &[u8],
    input: &[u8],
) -> Result<Vec<u8>> {
    let inter_key = generate_key_agile(pw_hash, block_key);
    let iv = generate_iv_agile(verifier_salt, None);
    aes_decrypt(&inter_key, &iv, input)
}

fn aes_decrypt(key: &[u8], iv: &[u8], input: &[u8]) -> Result<Vec<u8>> {
    if input.is_empty() || input.len() % AGILE_BLOCK_SIZE != 0 {
        return Err(Error::CorruptPackage(format!(
            "ciphertext of {} bytes is not a whole number of blocks",
            input.len()
        )));
    }
    Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|_| Error::CorruptPackage("invalid AES-128 key/iv".into()))?
        .decrypt_padded_vec_mut::<NoPadding>(input)
        .map_err(|_| Error::CorruptPackage("AES block decryption failed".into()))
}

/// StreamSize (u64 LE, unencrypted) followed by 4096-byte segments, each with its own IV.
fn encrypt_package_stream(content_key: &[u8], key_salt: &[u8], plain: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(8 + plain.len() + AGILE_BLOCK_SIZE);
    out.extend_from_slice(&(plain.len() as u64).to_le_bytes());

    let segments = plain.chunks(AGILE_SEGMENT_SIZE);
    let count = segments.len();
    for (index, segment) in segments.enumerate() {
        let iv = generate_iv_agile(key_salt, Some(&(index as u32).to_le_bytes()));
        let cipher = Aes128CbcEnc::new_from_slices(content_key, &iv)
            .map_err(|_| Error::InvalidArgument("invalid AES key/iv".into()))?;
        let ct = if index + 1 == count {
            cipher.encrypt_padded_vec_mut::<Pkcs7>(segment)
        } else {
            // 4096 is a multiple of the block size
            cipher.encrypt_padded_vec_mut::<NoPadding>(segment)
        };
        out.extend_from_slice(&ct);
    }
    Ok(out)
}

fn decrypt_package_stream(content_key: &[u8], key_salt: &[u8], stream: &[u8]) -> Result<Vec<u8>> {
    let (size, body) = stream
        .split_first_chunk::<8>()
        .ok_or_else(|| Error::CorruptPackage("encrypted package has no size header".to_string()))?;
    let size = u64::from_le_bytes(*size) as usize;
    if body.len() < size {
        return Err(Error::CorruptPackage(format!(
            "encrypted package declares {size} bytes but holds {}",
            body.len()
        )));
    }

    let mut out = Vec::with_capacity(body.len());
    for (index, segment) in body.chunks(AGILE_SEGMENT_SIZE).enumerate() {
        if out.len() >= size {
            break;
        }
        let iv = generate_iv_agile(key_salt, Some(&(index as u32).to_le_bytes()));
        out.extend_from_slice(&aes_decrypt(content_key, &iv, segment)?);
    }
    out.truncate(size);
    Ok(out)
}

struct InfoFields<'a> {
    key_salt: &'a [u8],
    verifier_salt: &'a [u8],
    encrypted_verifier: &'a [u8],
    encrypted_verifier_hash: &'a [u8],
    encrypted_key: &'a [u8],
    encrypted_hmac_key: &'a [u8],
    encrypted_hmac_value: &'a [u8],
    spin_count: u32,
}

fn build_agile_encryption_info_xml(f: &InfoFields<'_>) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<encryption xmlns="http://schemas.microsoft.com/office/2006/encryption"
 xmlns:p="http://schemas.microsoft.com/office/2006/keyEncryptor/password">
  <keyData saltSize="{salt_sz}" blockSize="{blk_sz}" keyBits="{key_bits}" hashSize="{hash_sz}"
           cipherAlgorithm="AES" cipherChaining="ChainingModeCBC" hashAlgorithm="SHA1"
           saltValue="{key_salt}"/>
  <dataIntegrity encryptedHmacKey="{enc_hmac_key}" encryptedHmacValue="{enc_hmac_val}"/>
  <keyEncryptors>
    <keyEncryptor uri="http://schemas.microsoft.com/office/2006/keyEncryptor/password">
      <p:encryptedKey spinCount="{spin}" saltSize="{salt_sz}" blockSize="{blk_sz}" keyBits="{key_bits}"
                      hashSize="{hash_sz}" cipherAlgorithm="AES" cipherChaining="ChainingModeCBC"
                      hashAlgorithm="SHA1" saltValue="{ver_salt}"
                      encryptedVerifierHashInput="{enc_ver}" encryptedVerifierHashValue="{enc_ver_hash}"
                      encryptedKeyValue="{enc_key}"/>
    </keyEncryptor>
  </keyEncryptors>
</encryption>"#,
        salt_sz = AGILE_BLOCK_SIZE,
        blk_sz = AGILE_BLOCK_SIZE,
        key_bits = AGILE_KEY_BITS,
        hash_sz = AGILE_HASH_SIZE,
        key_salt = BASE64_STANDARD.encode(f.key_salt),
        ver_salt = BASE64_STANDARD.encode(f.verifier_salt),
        enc_ver = BASE64_STANDARD.encode(f.encrypted_verifier),
        enc_ver_hash = BASE64_STANDARD.encode(f.encrypted_verifier_hash),
        enc_key = BASE64_STANDARD.encode(f.encrypted_key),
        enc_hmac_key = BASE64_STANDARD.encode(f.encrypted_hmac_key),
        enc_hmac_val = BASE64_STANDARD.encode(f.encrypted_hmac_value),
        spin = f.spin_count,
    )
}

/// Fields of an Agile EncryptionInfo record needed to decrypt.
struct AgileParams {
    key_salt: Vec<u8>,
    verifier_salt: Vec<u8>,
    spin_count: u32,
    encrypted_verifier: Vec<u8>,
    encrypted_verifier_hash: Vec<u8>,
    encrypted_key: Vec<u8>,
    encrypted_hmac_key: Vec<u8>,
    encrypted_hmac_value: Vec<u8>,
}

impl AgileParams {
    fn parse(info: &[u8]) -> Result<Self> {
        let corrupt = |what: &str| Error::CorruptPackage(format!("EncryptionInfo: {what}"));
        let (header, xml) = info
            .split_first_chunk::<8>()
            .ok_or_else(|| corrupt("record too short"))?;
        let major = u16::from_le_bytes([header[0], header[1]]);
        let minor = u16::from_le_bytes([header[2], header[3]]);
        if (major, minor) != (AGILE_ENCRYPTION_VERSION_MAJOR, AGILE_ENCRYPTION_VERSION_MINOR) {
            return Err(corrupt(&format!("unsupported version {major}.{minor}")));
        }

        let doc = XmlDocument::parse(xml)?;
        fn find<'d>(root: &'d XmlElement, name: &str) -> Result<&'d XmlElement> {
            root.find_all(name)
                .into_iter()
                .next()
                .ok_or_else(|| Error::CorruptPackage(format!("EncryptionInfo: missing {name}")))
        }
        let bytes = |el: &XmlElement, attr: &str| -> Result<Vec<u8>> {
            let value = el.attr(attr).ok_or_else(|| corrupt(&format!("missing {attr}")))?;
            BASE64_STANDARD
                .decode(value)
                .map_err(|_| corrupt(&format!("{attr} is not base64")))
        };

        let key_data = find(&doc.root, "keyData")?;
        let integrity = find(&doc.root, "dataIntegrity")?;
        let encrypted_key = find(&doc.root, "p:encryptedKey")?;
        for el in [key_data, encrypted_key] {
            if el.attr("cipherAlgorithm") != Some("AES")
                || el.attr("hashAlgorithm") != Some("SHA1")
                || el.attr("keyBits") != Some("128")
            {
                return Err(corrupt("only AES-128 with SHA-1 is supported"));
            }
        }
        let spin_count = encrypted_key
            .attr("spinCount")
            .and_then(|v| atoi_simd::parse::<u32>(v.as_bytes()).ok())
            .ok_or_else(|| corrupt("missing spinCount"))?;

        Ok(Self {
            key_salt: bytes(key_data, "saltValue")?,
            verifier_salt: bytes(encrypted_key, "saltValue")?,
            spin_count,
            encrypted_verifier: bytes(encrypted_key, "encryptedVerifierHashInput")?,
            encrypted_verifier_hash: bytes(encrypted_key, "encryptedVerifierHashValue")?,
            encrypted_key: bytes(encrypted_key, "encryptedKeyValue")?,
            encrypted_hmac_key: bytes(integrity, "encryptedHmacKey")?,
            encrypted_hmac_value: bytes(integrity, "encryptedHmacValue")?,
        })
    }
}
