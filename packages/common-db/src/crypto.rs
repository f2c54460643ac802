//! Módulo de criptografia para dados sensíveis
//!
//! Este módulo implementa as primitivas de criptografia usadas para
//! proteger texto clínico livre (notas de consulta) no banco de dados.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use anyhow::Result;
use rand::{rngs::OsRng as RandOsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

/// Erros específicos para operações de criptografia
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Falha na criptografia: {0}")]
    EncryptionFailed(String),

    #[error("Falha na descriptografia: {0}")]
    DecryptionFailed(String),

    #[error("Dados inválidos: {0}")]
    InvalidData(String),
}

/// Tamanho do nonce em bytes para AES-GCM
const AES_GCM_NONCE_SIZE: usize = 12;

/// Chave AES-256 para criptografia (com zeroização automática)
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct EncryptionKey(pub [u8; 32]);

impl EncryptionKey {
    /// Cria uma nova chave aleatória
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        RandOsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Cria uma chave a partir de bytes existentes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidData(format!(
                "A chave deve ter 32 bytes, recebeu {}",
                bytes.len()
            ))
            .into());
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Deriva a chave de dados a partir da frase-senha configurada.
    ///
    /// Derivação determinística via SHA-256: a mesma frase produz sempre a
    /// mesma chave, condição necessária para reler dados entre reinícios.
    pub fn from_phrase(phrase: &str) -> Self {
        let digest = Sha256::digest(phrase.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self(key)
    }

    /// Converte para bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Estrutura que armazena dados criptografados e seu nonce
#[derive(Debug, Clone)]
pub struct EncryptedData {
    /// Dados criptografados
    pub ciphertext: Vec<u8>,
    /// Nonce usado na criptografia
    pub nonce: Vec<u8>,
}

/// Criptografa dados usando AES-256-GCM
pub fn encrypt(data: &[u8], key: &EncryptionKey) -> Result<EncryptedData> {
    let aes_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(aes_key);

    // Gerar nonce aleatório
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedData {
        ciphertext,
        nonce: nonce.to_vec(),
    })
}

/// Descriptografa dados usando AES-256-GCM
pub fn decrypt(encrypted: &EncryptedData, key: &EncryptionKey) -> Result<Vec<u8>> {
    let aes_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(aes_key);

    // Verificar nonce
    if encrypted.nonce.len() != AES_GCM_NONCE_SIZE {
        return Err(CryptoError::InvalidData(format!(
            "Nonce inválido: esperado {} bytes, recebido {}",
            AES_GCM_NONCE_SIZE,
            encrypted.nonce.len()
        ))
        .into());
    }

    let nonce = Nonce::from_slice(&encrypted.nonce);

    let plaintext = cipher
        .decrypt(nonce, encrypted.ciphertext.as_ref())
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_decryption() -> Result<()> {
        // Dados de teste
        let data = b"Paciente relatou dor de cabeca recorrente";

        let key = EncryptionKey::generate();

        let encrypted = encrypt(data, &key)?;

        // Verificar se o ciphertext é diferente do plaintext
        assert_ne!(&encrypted.ciphertext, data);

        let decrypted = decrypt(&encrypted, &key)?;

        // Verificar se recuperamos os dados originais
        assert_eq!(&decrypted, data);

        Ok(())
    }

    #[test]
    fn test_encryption_with_different_keys() -> Result<()> {
        let data = b"Dados de teste";

        let key1 = EncryptionKey::generate();
        let key2 = EncryptionKey::generate();

        assert_ne!(key1.as_bytes(), key2.as_bytes());

        let encrypted = encrypt(data, &key1)?;

        // Descriptografar com a chave errada deve falhar
        let result = decrypt(&encrypted, &key2);
        assert!(result.is_err());

        let decrypted = decrypt(&encrypted, &key1)?;
        assert_eq!(&decrypted, data);

        Ok(())
    }

    #[test]
    fn test_key_derivation_from_phrase() -> Result<()> {
        let key1 = EncryptionKey::from_phrase("frase-do-ambiente");
        let key2 = EncryptionKey::from_phrase("frase-do-ambiente");
        let key3 = EncryptionKey::from_phrase("outra-frase");

        // Mesma frase, mesma chave; frases diferentes, chaves diferentes
        assert_eq!(key1.as_bytes(), key2.as_bytes());
        assert_ne!(key1.as_bytes(), key3.as_bytes());

        // Dados criptografados com a chave derivada devem rodar o ciclo completo
        let encrypted = encrypt(b"nota clinica", &key1)?;
        let decrypted = decrypt(&encrypted, &key2)?;
        assert_eq!(&decrypted, b"nota clinica");

        Ok(())
    }
}
