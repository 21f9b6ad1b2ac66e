//! ACME certificate issuance over HTTP-01.
//!
//! The account key is persisted in the cache directory alongside one
//! PEM pair per host and an issuance-timestamp sidecar that drives
//! renewal (ACME certificates run 90 days; re-issue after 60). Challenge
//! tokens are handed to the plaintext listener through the shared
//! [`ChallengeStore`]; issuance is gated by the [`HostPolicy`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use instant_acme::{
    Account, AccountCredentials, AuthorizationStatus, ChallengeType, Identifier, LetsEncrypt,
    NewAccount, NewOrder, OrderStatus,
};
use rcgen::{CertificateParams, DistinguishedName, KeyPair};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{CertError, CertResult};
use crate::policy::HostPolicy;
use crate::store::{CertKeyPem, CertStore, ChallengeStore};

/// Re-issue once a certificate is older than this.
pub const RENEW_AFTER: Duration = Duration::from_secs(60 * 24 * 60 * 60);

const ORDER_POLL_TRIES: u32 = 10;

/// Issuance timestamp recorded next to each cached certificate.
#[derive(Debug, Serialize, Deserialize)]
struct CertMeta {
    issued_at: u64,
}

/// Read the cached pair for a host, if both files exist.
pub fn cached_pair(cache_dir: &Path, host: &str) -> Option<CertKeyPem> {
    let cert_pem = std::fs::read_to_string(cache_dir.join(format!("{host}.crt"))).ok()?;
    let key_pem = std::fs::read_to_string(cache_dir.join(format!("{host}.key"))).ok()?;
    Some(CertKeyPem { cert_pem, key_pem })
}

/// Persist an issued pair and stamp its issuance time.
pub fn store_pair(cache_dir: &Path, host: &str, pair: &CertKeyPem) -> CertResult<()> {
    std::fs::create_dir_all(cache_dir)?;
    std::fs::write(cache_dir.join(format!("{host}.crt")), &pair.cert_pem)?;
    std::fs::write(cache_dir.join(format!("{host}.key")), &pair.key_pem)?;
    let meta = CertMeta {
        issued_at: unix_now(),
    };
    std::fs::write(
        cache_dir.join(format!("{host}.meta.json")),
        serde_json::to_string(&meta)?,
    )?;
    Ok(())
}

/// Whether the cached certificate for a host is due for re-issuance.
///
/// A missing or unreadable sidecar counts as due.
pub fn renewal_due(cache_dir: &Path, host: &str) -> bool {
    let path = cache_dir.join(format!("{host}.meta.json"));
    let Ok(content) = std::fs::read_to_string(&path) else {
        return true;
    };
    let Ok(meta) = serde_json::from_str::<CertMeta>(&content) else {
        return true;
    };
    unix_now().saturating_sub(meta.issued_at) > RENEW_AFTER.as_secs()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Issues and renews per-host certificates against an ACME directory.
pub struct AcmeManager {
    account: Account,
    cache_dir: PathBuf,
    policy: HostPolicy,
    challenges: ChallengeStore,
    store: CertStore,
}

impl AcmeManager {
    /// Open or create the ACME account persisted in `cache_dir`.
    pub async fn new(
        contact_email: &str,
        directory_url: Option<&str>,
        cache_dir: PathBuf,
        policy: HostPolicy,
        challenges: ChallengeStore,
        store: CertStore,
    ) -> CertResult<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        let credentials_path = cache_dir.join("account.json");

        let account = if credentials_path.exists() {
            let content = std::fs::read_to_string(&credentials_path)?;
            let credentials: AccountCredentials = serde_json::from_str(&content)?;
            Account::from_credentials(credentials).await?
        } else {
            let directory = directory_url
                .map(str::to_owned)
                .unwrap_or_else(|| LetsEncrypt::Production.url().to_owned());
            let contact = format!("mailto:{contact_email}");
            let (account, credentials) = Account::create(
                &NewAccount {
                    contact: &[contact.as_str()],
                    terms_of_service_agreed: true,
                    only_return_existing: false,
                },
                &directory,
                None,
            )
            .await?;
            std::fs::write(&credentials_path, serde_json::to_string_pretty(&credentials)?)?;
            info!(%directory, "created ACME account");
            account
        };

        Ok(Self {
            account,
            cache_dir,
            policy,
            challenges,
            store,
        })
    }

    /// Load every cached certificate into the store. Returns the count.
    pub fn load_cached(&self) -> u32 {
        let mut loaded = 0;
        for host in self.policy.hosts() {
            let Some(pair) = cached_pair(&self.cache_dir, &host) else {
                continue;
            };
            match pair.to_certified_key() {
                Ok(key) => {
                    self.store.insert(&host, key);
                    loaded += 1;
                }
                Err(e) => warn!(%host, error = %e, "cached certificate unreadable, will re-issue"),
            }
        }
        loaded
    }

    /// Issue or re-issue certificates for every allowed host that needs
    /// one. Per-host failures are logged and do not stop the sweep.
    pub async fn ensure_all(&self) -> u32 {
        let mut issued = 0;
        for host in self.policy.hosts() {
            let cached = self.store.get(&host).is_some();
            if cached && !renewal_due(&self.cache_dir, &host) {
                continue;
            }
            match self.issue(&host).await {
                Ok(()) => issued += 1,
                Err(e) => warn!(%host, error = %e, "certificate issuance failed"),
            }
        }
        issued
    }

    /// Order one certificate over HTTP-01.
    pub async fn issue(&self, host: &str) -> CertResult<()> {
        self.policy.check(host)?;
        info!(%host, "ordering certificate");

        let identifier = Identifier::Dns(host.to_string());
        let mut order = self
            .account
            .new_order(&NewOrder {
                identifiers: &[identifier],
            })
            .await?;

        let authorizations = order.authorizations().await?;
        let mut tokens = Vec::new();
        for authz in &authorizations {
            match authz.status {
                AuthorizationStatus::Pending => {}
                AuthorizationStatus::Valid => continue,
                status => {
                    return Err(CertError::OrderFailed {
                        host: host.to_string(),
                        detail: format!("authorization in unexpected state {status:?}"),
                    });
                }
            }

            let challenge = authz
                .challenges
                .iter()
                .find(|c| c.r#type == ChallengeType::Http01)
                .ok_or_else(|| CertError::OrderFailed {
                    host: host.to_string(),
                    detail: "no HTTP-01 challenge offered".to_string(),
                })?;

            let key_auth = order.key_authorization(challenge);
            self.challenges.insert(&challenge.token, key_auth.as_str());
            tokens.push(challenge.token.clone());
            order.set_challenge_ready(&challenge.url).await?;
        }

        let result = self.finalize_order(host, &mut order).await;
        for token in &tokens {
            self.challenges.remove(token);
        }
        result
    }

    async fn finalize_order(
        &self,
        host: &str,
        order: &mut instant_acme::Order,
    ) -> CertResult<()> {
        let mut delay = Duration::from_millis(500);
        let mut tries = 0;
        let status = loop {
            tokio::time::sleep(delay).await;
            let status = order.refresh().await?.status;
            match status {
                OrderStatus::Ready | OrderStatus::Valid | OrderStatus::Invalid => break status,
                _ => {
                    tries += 1;
                    if tries > ORDER_POLL_TRIES {
                        return Err(CertError::OrderFailed {
                            host: host.to_string(),
                            detail: "order never became ready".to_string(),
                        });
                    }
                    delay = (delay * 2).min(Duration::from_secs(8));
                }
            }
        };
        if status == OrderStatus::Invalid {
            return Err(CertError::OrderFailed {
                host: host.to_string(),
                detail: "order was invalidated by the directory".to_string(),
            });
        }

        let mut params = CertificateParams::new(vec![host.to_string()])?;
        params.distinguished_name = DistinguishedName::new();
        let key_pair = KeyPair::generate()?;
        let csr = params.serialize_request(&key_pair)?;
        order.finalize(csr.der()).await?;

        let mut tries = 0;
        let cert_chain_pem = loop {
            match order.certificate().await? {
                Some(pem) => break pem,
                None => {
                    tries += 1;
                    if tries > ORDER_POLL_TRIES {
                        return Err(CertError::OrderFailed {
                            host: host.to_string(),
                            detail: "certificate never became available".to_string(),
                        });
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        };

        let pair = CertKeyPem {
            cert_pem: cert_chain_pem,
            key_pem: key_pair.serialize_pem(),
        };
        store_pair(&self.cache_dir, host, &pair)?;
        self.store.insert(host, pair.to_certified_key()?);
        info!(%host, "certificate issued and cached");
        Ok(())
    }

    /// Background renewal sweep. Runs until the shutdown signal.
    pub async fn run_renewal(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let issued = self.ensure_all().await;
                    if issued > 0 {
                        info!(issued, "renewal sweep re-issued certificates");
                    }
                }
                _ = shutdown.changed() => {
                    info!("certificate renewal shutting down");
                    break;
                }
            }
        }
    }
}
