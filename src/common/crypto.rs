// src/common/crypto.rs
//
// Primitivas criptográficas do núcleo: hash de arquivos, hash lento de
// senhas/OTPs, tokens opacos de compartilhamento e códigos numéricos.
// O valor bruto de um token nunca é persistido nem logado; somente o hash.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};

use crate::common::error::AppError;

/// SHA-256 de um blob, em hexadecimal minúsculo (64 chars).
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash lento (bcrypt) para senhas e OTPs. Roda em `spawn_blocking` para
/// não travar o executor do Tokio.
pub async fn password_hash(plain: &str) -> Result<String, AppError> {
    let plain = plain.to_owned();
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(&plain, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
    Ok(hashed)
}

/// Verificação do hash lento, também fora do executor.
pub async fn password_verify(plain: &str, hash: &str) -> Result<bool, AppError> {
    let plain = plain.to_owned();
    let hash = hash.to_owned();
    let ok = tokio::task::spawn_blocking(move || bcrypt::verify(&plain, &hash))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação: {}", e))??;
    Ok(ok)
}

/// Gera um token opaco de compartilhamento: 32 bytes do CSPRNG do sistema,
/// codificados em base64 url-safe. Retorna `(token_bruto, sha256_do_token)`;
/// apenas o hash vai para o banco.
pub fn mint_share_token() -> (String, String) {
    let mut raw = [0u8; 32];
    OsRng.fill_bytes(&mut raw);
    let token = URL_SAFE_NO_PAD.encode(raw);
    let token_hash = sha256_hex(token.as_bytes());
    (token, token_hash)
}

/// Código numérico de 6 dígitos, uniforme em [100000, 999999].
pub fn mint_otp6() -> String {
    let code: u32 = OsRng.gen_range(100_000..=999_999);
    code.to_string()
}

/// Código curto de conferência: os 6 primeiros hex do hash da assinatura,
/// em maiúsculas. É o que aparece no carimbo visual do PDF.
pub fn short_code_from_signature_hash(signature_hash: &str) -> String {
    signature_hash.chars().take(6).collect::<String>().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_conhecido() {
        // Vetores clássicos do NIST.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn token_opaco_nao_contem_o_hash() {
        let (raw, hash) = mint_share_token();
        assert!(raw.len() >= 43); // 32 bytes em base64 url-safe sem padding
        assert_eq!(hash.len(), 64);
        assert_ne!(raw, hash);
        assert_eq!(sha256_hex(raw.as_bytes()), hash);
    }

    #[test]
    fn tokens_sao_unicos() {
        let (a, _) = mint_share_token();
        let (b, _) = mint_share_token();
        assert_ne!(a, b);
    }

    #[test]
    fn otp_tem_6_digitos() {
        for _ in 0..100 {
            let otp = mint_otp6();
            assert_eq!(otp.len(), 6);
            let n: u32 = otp.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[test]
    fn codigo_curto() {
        assert_eq!(short_code_from_signature_hash("a1b2c3d4e5f6"), "A1B2C3");
    }

    #[tokio::test]
    async fn hash_e_verificacao_de_senha() {
        let hash = password_hash("senha123").await.unwrap();
        assert!(password_verify("senha123", &hash).await.unwrap());
        assert!(!password_verify("senha456", &hash).await.unwrap());
    }
}
