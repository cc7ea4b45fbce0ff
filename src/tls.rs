//! TLS 证书加载，证书缺失时在内存中生成自签名证书。

use axum_server::tls_rustls::RustlsConfig;
use rcgen::generate_simple_self_signed;
use std::net::IpAddr;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

use crate::config::Args;

/// 从配置的两个 PEM 路径构建 Rustls 配置。
///
/// 任一文件缺失时改用自签名证书；私钥只存在于内存中，不落盘。
pub async fn build_rustls_config(
    args: &Args,
    host: IpAddr,
) -> Result<RustlsConfig, std::io::Error> {
    let cert_path = PathBuf::from(&args.tls_cert);
    let key_path = PathBuf::from(&args.tls_key);
    let (cert, key) = if cert_path.is_file() && key_path.is_file() {
        info!(cert = %cert_path.display(), "loading tls certificate");
        (fs::read(&cert_path).await?, fs::read(&key_path).await?)
    } else {
        warn!(
            cert = %cert_path.display(),
            key = %key_path.display(),
            "tls cert or key missing, falling back to self-signed"
        );
        generate_self_signed_pem(host)?
    };
    RustlsConfig::from_pem(cert, key).await
}

/// 为绑定地址生成自签名证书，返回 `(cert_pem, key_pem)`。
fn generate_self_signed_pem(host: IpAddr) -> Result<(Vec<u8>, Vec<u8>), std::io::Error> {
    let mut names = vec![host.to_string()];
    if host.is_unspecified() {
        names.push("localhost".to_string());
    }
    let cert = generate_simple_self_signed(names.clone())
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    info!(names = ?names, "generated self-signed certificate");
    Ok((
        cert.cert.pem().into_bytes(),
        cert.key_pair.serialize_pem().into_bytes(),
    ))
}

#[cfg(test)]
mod tests {
    use super::generate_self_signed_pem;

    #[test]
    fn self_signed_pair_is_pem() {
        let (cert, key) = generate_self_signed_pem("127.0.0.1".parse().expect("ip")).expect("generate");
        let cert = String::from_utf8(cert).expect("cert");
        let key = String::from_utf8(key).expect("key");
        assert!(cert.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(key.contains("PRIVATE KEY-----"));
    }

    #[test]
    fn self_signed_pair_does_not_touch_temp_dir() {
        let key_path = std::env::temp_dir().join("localweb-key.pem");
        let existed = key_path.exists();
        generate_self_signed_pem("0.0.0.0".parse().expect("ip")).expect("generate");
        assert_eq!(key_path.exists(), existed);
    }
}
