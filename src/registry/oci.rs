//! OCI distribution registry backend

use crate::deadline::Deadline;
use crate::error::{LaminaError, LaminaResult};
use crate::image::{Image, ImageLayer, CONFIG_MEDIA_TYPE};
use crate::registry::Registry;
use async_trait::async_trait;
use oci_distribution::client::{
    Client, ClientConfig, ClientProtocol, Config as OciConfig, ImageLayer as OciLayer,
};
use oci_distribution::errors::{OciDistributionError, OciErrorCode};
use oci_distribution::manifest::{IMAGE_DOCKER_LAYER_GZIP_MEDIA_TYPE, IMAGE_LAYER_GZIP_MEDIA_TYPE};
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::Reference;
use std::env;
use tracing::{debug, info};

/// Environment variable holding the registry user name
pub const USERNAME_ENV: &str = "LAMINA_REGISTRY_USERNAME";

/// Environment variable holding the registry password or token
pub const PASSWORD_ENV: &str = "LAMINA_REGISTRY_PASSWORD";

/// Registry reached over the OCI distribution protocol
pub struct OciRegistry {
    auth: RegistryAuth,
    insecure: Vec<String>,
}

impl OciRegistry {
    /// Create a registry client with explicit credentials.
    ///
    /// Hosts in `insecure` are contacted over plain HTTP.
    pub fn new(auth: RegistryAuth, insecure: Vec<String>) -> Self {
        Self { auth, insecure }
    }

    fn client(&self) -> Client {
        let protocol = if self.insecure.is_empty() {
            ClientProtocol::Https
        } else {
            ClientProtocol::HttpsExcept(self.insecure.clone())
        };
        Client::new(ClientConfig {
            protocol,
            ..Default::default()
        })
    }
}

/// Read registry credentials from the environment.
///
/// Both variables unset means anonymous access; setting only one of them is
/// a configuration mistake.
pub fn registry_auth_from_env() -> LaminaResult<RegistryAuth> {
    let username = env::var(USERNAME_ENV).unwrap_or_default();
    let password = env::var(PASSWORD_ENV).unwrap_or_default();
    match (username.is_empty(), password.is_empty()) {
        (true, true) => Ok(RegistryAuth::Anonymous),
        (false, false) => Ok(RegistryAuth::Basic(username, password)),
        _ => Err(LaminaError::User(format!(
            "registry credentials incomplete: set both {} and {}",
            USERNAME_ENV, PASSWORD_ENV
        ))),
    }
}

fn parse_reference(location: &str) -> LaminaResult<Reference> {
    location
        .parse::<Reference>()
        .map_err(|e| LaminaError::InvalidReference {
            reference: location.to_string(),
            reason: e.to_string(),
        })
}

/// Whether a pull failure means "nothing stored at this location".
///
/// Decided on the error variant only: a registry envelope counts as a miss
/// when every code in it is `MANIFEST_UNKNOWN` or `NAME_UNKNOWN`.
fn is_not_found(err: &OciDistributionError) -> bool {
    match err {
        OciDistributionError::ImageManifestNotFoundError(_) => true,
        OciDistributionError::RegistryError { envelope, .. } => {
            !envelope.errors.is_empty()
                && envelope.errors.iter().all(|e| {
                    matches!(
                        e.code,
                        OciErrorCode::ManifestUnknown | OciErrorCode::NameUnknown
                    )
                })
        }
        OciDistributionError::ServerError { code, .. } => *code == 404,
        _ => false,
    }
}

#[async_trait]
impl Registry for OciRegistry {
    async fn push(&self, location: &str, image: &Image, deadline: Deadline) -> LaminaResult<Image> {
        let reference = parse_reference(location)?;
        let layers: Vec<OciLayer> = image
            .layers
            .iter()
            .map(|layer| OciLayer::new(layer.data.to_vec(), layer.media_type.clone(), None))
            .collect();
        let config = OciConfig::new(image.config.to_vec(), CONFIG_MEDIA_TYPE.to_string(), None);

        info!("Pushing {} ({} layers)", location, layers.len());
        let mut client = self.client();
        let response = deadline
            .run(&format!("push {}", location), async {
                client
                    .push(&reference, &layers, config, &self.auth, None)
                    .await
                    .map_err(|e| LaminaError::registry(location, e))
            })
            .await?;
        debug!("Pushed manifest {}", response.manifest_url);

        Ok(image.renamed(location))
    }

    async fn pull_if_exists(
        &self,
        location: &str,
        deadline: Deadline,
    ) -> LaminaResult<Option<Image>> {
        let reference = parse_reference(location)?;
        let mut client = self.client();

        debug!("Pulling {}", location);
        let pulled = deadline
            .run(&format!("pull {}", location), async {
                match client
                    .pull(
                        &reference,
                        &self.auth,
                        vec![IMAGE_LAYER_GZIP_MEDIA_TYPE, IMAGE_DOCKER_LAYER_GZIP_MEDIA_TYPE],
                    )
                    .await
                {
                    Ok(data) => Ok(Some(data)),
                    Err(e) if is_not_found(&e) => Ok(None),
                    Err(e) => Err(LaminaError::registry(location, e)),
                }
            })
            .await?;

        let Some(data) = pulled else {
            debug!("Nothing stored at {}", location);
            return Ok(None);
        };

        let layers = data
            .layers
            .into_iter()
            .map(|layer| ImageLayer::new(layer.data, layer.media_type))
            .collect();
        Ok(Some(Image::new(location, data.config.data, layers)))
    }

    fn registry_name(&self) -> &'static str {
        "oci"
    }
}
