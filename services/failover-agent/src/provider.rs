//! HTTP gateway to the cloud provider.
//!
//! Every provider operation is a `POST {base}/{service}/{Action}` with a JSON
//! body using the provider's field names. The region is sent in a header.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fasi_reconcile::records::{AddressRecord, GroupPage, GroupQuery, VolumeRecord};
use fasi_reconcile::{ProviderError, ProviderGateway};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::Config;

/// Header carrying the target region.
pub const REGION_HEADER: &str = "x-fasi-region";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SetDesiredCapacityRequest<'a> {
    auto_scaling_group_name: &'a str,
    desired_capacity: u32,
    honor_cooldown: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeAddressesRequest<'a> {
    allocation_ids: &'a BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeAddressesResponse {
    #[serde(default)]
    addresses: Vec<AddressRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AssociateAddressRequest<'a> {
    instance_id: &'a str,
    allocation_id: &'a str,
    allow_reassociation: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeVolumesRequest<'a> {
    volume_ids: &'a BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeVolumesResponse {
    #[serde(default)]
    volumes: Vec<VolumeRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct VolumeAttachmentRequest<'a> {
    instance_id: &'a str,
    volume_id: &'a str,
    device: &'a str,
}

/// Provider gateway speaking JSON over HTTP.
pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProvider {
    /// Create a provider client from agent configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            REGION_HEADER,
            HeaderValue::from_str(&config.region)
                .with_context(|| format!("invalid region {:?}", config.region))?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.provider_url.clone(),
        })
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(operation, url = %url, "Calling provider");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Request {
                operation,
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(operation, status = %status, body = %body, "Provider call failed");
            return Err(ProviderError::Status {
                operation,
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn call<B, R>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.post(operation, path, body)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Decode {
                operation,
                message: e.to_string(),
            })
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<(), ProviderError> {
        self.post(operation, path, body).await.map(|_| ())
    }
}

#[async_trait]
impl ProviderGateway for HttpProvider {
    async fn list_groups(&self, query: &GroupQuery) -> Result<GroupPage, ProviderError> {
        self.call("list_groups", "autoscaling/DescribeAutoScalingGroups", query)
            .await
    }

    async fn set_desired_capacity(
        &self,
        group_name: &str,
        desired_capacity: u32,
        honor_cooldown: bool,
    ) -> Result<(), ProviderError> {
        let body = SetDesiredCapacityRequest {
            auto_scaling_group_name: group_name,
            desired_capacity,
            honor_cooldown,
        };
        self.send("set_desired_capacity", "autoscaling/SetDesiredCapacity", &body)
            .await
    }

    async fn describe_addresses(
        &self,
        allocation_ids: &BTreeSet<String>,
    ) -> Result<Vec<AddressRecord>, ProviderError> {
        let body = DescribeAddressesRequest { allocation_ids };
        let response: DescribeAddressesResponse = self
            .call("describe_addresses", "ec2/DescribeAddresses", &body)
            .await?;
        Ok(response.addresses)
    }

    async fn associate_address(
        &self,
        instance_id: &str,
        allocation_id: &str,
        allow_reassociation: bool,
    ) -> Result<(), ProviderError> {
        let body = AssociateAddressRequest {
            instance_id,
            allocation_id,
            allow_reassociation,
        };
        self.send("associate_address", "ec2/AssociateAddress", &body).await
    }

    async fn describe_volumes(
        &self,
        volume_ids: &BTreeSet<String>,
    ) -> Result<Vec<VolumeRecord>, ProviderError> {
        let body = DescribeVolumesRequest { volume_ids };
        let response: DescribeVolumesResponse = self
            .call("describe_volumes", "ec2/DescribeVolumes", &body)
            .await?;
        Ok(response.volumes)
    }

    async fn detach_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        device: &str,
    ) -> Result<(), ProviderError> {
        let body = VolumeAttachmentRequest {
            instance_id,
            volume_id,
            device,
        };
        self.send("detach_volume", "ec2/DetachVolume", &body).await
    }

    async fn attach_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        device: &str,
    ) -> Result<(), ProviderError> {
        let body = VolumeAttachmentRequest {
            instance_id,
            volume_id,
            device,
        };
        self.send("attach_volume", "ec2/AttachVolume", &body).await
    }
}
