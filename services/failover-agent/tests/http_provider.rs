//! HTTP provider tests against a mock provider gateway.

use std::collections::BTreeSet;
use std::sync::Arc;

use fasi_agent::{Config, HttpProvider};
use fasi_reconcile::records::GroupQuery;
use fasi_reconcile::{FailoverReconciler, ProviderError, ProviderGateway};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer) -> Config {
    let uri = server.uri();
    Config::from_lookup(|key| match key {
        "FASI_PROVIDER_URL" => Some(uri.clone()),
        "FASI_REGION" => Some("us-east-1".to_string()),
        _ => None,
    })
    .unwrap()
}

fn ids(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
async fn test_list_groups_decodes_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/autoscaling/DescribeAutoScalingGroups"))
        .and(header("x-fasi-region", "us-east-1"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AutoScalingGroups": [{
                "AutoScalingGroupName": "web",
                "DesiredCapacity": 3,
                "Instances": [{"InstanceId": "i-1"}],
                "Tags": [{"Key": "_fasi_failover", "Value": "web-spot"}]
            }],
            "NextToken": "t1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpProvider::new(&test_config(&server)).unwrap();
    let page = provider.list_groups(&GroupQuery::default()).await.unwrap();

    assert_eq!(page.auto_scaling_groups.len(), 1);
    assert_eq!(page.auto_scaling_groups[0].desired_capacity, 3);
    assert_eq!(page.next_token.as_deref(), Some("t1"));
}

#[tokio::test]
async fn test_set_desired_capacity_sends_provider_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/autoscaling/SetDesiredCapacity"))
        .and(body_json(json!({
            "AutoScalingGroupName": "web-spot",
            "DesiredCapacity": 2,
            "HonorCooldown": false
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpProvider::new(&test_config(&server)).unwrap();
    provider
        .set_desired_capacity("web-spot", 2, false)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_describe_addresses_and_associate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ec2/DescribeAddresses"))
        .and(body_json(json!({"AllocationIds": ["eip-1"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Addresses": [{"AllocationId": "eip-1"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ec2/AssociateAddress"))
        .and(body_json(json!({
            "InstanceId": "i-x",
            "AllocationId": "eip-1",
            "AllowReassociation": true
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpProvider::new(&test_config(&server)).unwrap();
    let addresses = provider.describe_addresses(&ids(&["eip-1"])).await.unwrap();
    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0].instance_id, None);

    provider
        .associate_address("i-x", "eip-1", true)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_describe_volumes_and_detach() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ec2/DescribeVolumes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Volumes": [{
                "VolumeId": "vol-1",
                "Attachments": [{"State": "attached", "InstanceId": "i-z"}]
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ec2/DetachVolume"))
        .and(body_json(json!({
            "InstanceId": "i-z",
            "VolumeId": "vol-1",
            "Device": "/dev/sdf"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpProvider::new(&test_config(&server)).unwrap();
    let volumes = provider.describe_volumes(&ids(&["vol-1"])).await.unwrap();
    assert_eq!(volumes[0].current_instance(), Some("i-z"));

    provider
        .detach_volume("i-z", "vol-1", "/dev/sdf")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_attach_volume_sends_provider_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ec2/AttachVolume"))
        .and(header("x-fasi-region", "us-east-1"))
        .and(body_json(json!({
            "InstanceId": "i-y",
            "VolumeId": "vol-1",
            "Device": "/dev/sdf"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpProvider::new(&test_config(&server)).unwrap();
    provider
        .attach_volume("i-y", "vol-1", "/dev/sdf")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_error_status_maps_to_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ec2/AttachVolume"))
        .respond_with(ResponseTemplate::new(400).set_body_string("VolumeInUse"))
        .mount(&server)
        .await;

    let provider = HttpProvider::new(&test_config(&server)).unwrap();
    let err = provider
        .attach_volume("i-y", "vol-1", "/dev/sdf")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProviderError::Status {
            operation: "attach_volume",
            status: 400,
            body: "VolumeInUse".to_string(),
        }
    );
}

#[tokio::test]
async fn test_undecodable_response_maps_to_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ec2/DescribeVolumes"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let provider = HttpProvider::new(&test_config(&server)).unwrap();
    let err = provider
        .describe_volumes(&ids(&["vol-1"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProviderError::Decode {
            operation: "describe_volumes",
            ..
        }
    ));
}

#[tokio::test]
async fn test_reconcile_over_http_follows_pages_and_scales() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/autoscaling/DescribeAutoScalingGroups"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AutoScalingGroups": [{
                "AutoScalingGroupName": "web",
                "DesiredCapacity": 3,
                "Instances": [{"InstanceId": "i-x"}],
                "Tags": [{"Key": "_fasi_failover", "Value": "web-spot"}]
            }],
            "NextToken": "t1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/autoscaling/DescribeAutoScalingGroups"))
        .and(body_json(json!({"NextToken": "t1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AutoScalingGroups": [{
                "AutoScalingGroupName": "web-spot",
                "DesiredCapacity": 0
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/autoscaling/SetDesiredCapacity"))
        .and(body_json(json!({
            "AutoScalingGroupName": "web-spot",
            "DesiredCapacity": 2,
            "HonorCooldown": false
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server);
    let provider = Arc::new(HttpProvider::new(&config).unwrap());
    let report = FailoverReconciler::new(provider, config.reconcile_settings())
        .reconcile_once()
        .await
        .unwrap();

    assert_eq!(report.groups, 2);
    assert_eq!(report.pairs, 1);
    assert_eq!(report.issued.len(), 1);
    assert!(report.failed.is_empty());
}
