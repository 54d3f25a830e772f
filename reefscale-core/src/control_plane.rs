//! Free functions for the handful of control-plane endpoints the
//! autoscaler's tick algorithm consumes. No inheritance hierarchy of
//! "client types" — every operation here is a plain function
//! parameterized by a shared [`ApiClient`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use reefscale_http::{media, ApiClient, ControlPlaneError};
use reefscale_metrics::MetricDataPoint;
use reefscale_topology::ClusterDescriptionDto;

use crate::descriptors::{ProcessDescriptor, ProjectDescriptor};

const PAGE_SIZE: u64 = 500;

/// Base path for the primary, versioned API. `ApiClient::base_url` is just
/// the scheme+host — every endpoint function here supplies the versioned
/// prefix itself, since the one disk-measurement endpoint lives under a
/// different version (`V1_BASE`) on the same host.
const V2_BASE: &str = "/api/atlas/v2";

/// Base path for the legacy API that still serves disk/partition
/// measurements.
const V1_BASE: &str = "/api/atlas/v1.0";

pub async fn list_projects(client: &ApiClient, cancel: &CancellationToken) -> Result<Vec<ProjectDescriptor>, ControlPlaneError> {
    client.list_results(&format!("{V2_BASE}/groups"), PAGE_SIZE, media::ATLAS_V2_JSON, cancel).await
}

pub async fn list_clusters(
    client: &ApiClient,
    project_id: &str,
    cancel: &CancellationToken,
) -> Result<Vec<ClusterDescriptionDto>, ControlPlaneError> {
    let path = format!("{V2_BASE}/groups/{project_id}/clusters");
    client.list_results(&path, PAGE_SIZE, media::ATLAS_V2_JSON, cancel).await
}

pub async fn get_cluster(
    client: &ApiClient,
    project_id: &str,
    cluster_name: &str,
    cancel: &CancellationToken,
) -> Result<ClusterDescriptionDto, ControlPlaneError> {
    let path = format!("{V2_BASE}/groups/{project_id}/clusters/{cluster_name}");
    client.get_json(&path, media::ATLAS_V2_JSON, cancel).await
}

/// Replaces `replicationSpecs` on `cluster_name`. The response body (the
/// post-mutation cluster description, typically `stateName=UPDATING`) is
/// discarded — the scheduler only needs to know the call succeeded.
pub async fn update_cluster_topology(
    client: &ApiClient,
    project_id: &str,
    cluster_name: &str,
    payload: &serde_json::Value,
    cancel: &CancellationToken,
) -> Result<(), ControlPlaneError> {
    let path = format!("{V2_BASE}/groups/{project_id}/clusters/{cluster_name}");
    let _: serde_json::Value = client.patch_json(&path, payload, media::ATLAS_V2_JSON, cancel).await?;
    Ok(())
}

pub async fn list_processes(client: &ApiClient, project_id: &str, cancel: &CancellationToken) -> Result<Vec<ProcessDescriptor>, ControlPlaneError> {
    let path = format!("{V2_BASE}/groups/{project_id}/processes");
    client.list_results(&path, PAGE_SIZE, media::ATLAS_V2_JSON, cancel).await
}

#[derive(Debug, Deserialize)]
struct MeasurementsResponseDto {
    #[serde(default)]
    measurements: Vec<MeasurementSeriesDto>,
}

#[derive(Debug, Deserialize)]
struct MeasurementSeriesDto {
    name: String,
    #[serde(default, rename = "dataPoints")]
    data_points: Vec<DataPointDto>,
}

#[derive(Debug, Deserialize)]
struct DataPointDto {
    timestamp: DateTime<Utc>,
    value: Option<f64>,
}

/// Fetches `period`-windowed measurements at `granularity` for every metric
/// in `metric_names`, for one process. Callers fetch the last 10 minutes at
/// `PT1M` first, retrying at `PT10S` if the response comes back with no data
/// points at all.
pub async fn fetch_measurements(
    client: &ApiClient,
    project_id: &str,
    hostname: &str,
    port: u16,
    metric_names: &[String],
    granularity: &str,
    period: &str,
    cancel: &CancellationToken,
) -> Result<Vec<(String, Vec<MetricDataPoint>)>, ControlPlaneError> {
    let metric_query: String = metric_names.iter().map(|m| format!("&m={m}")).collect();
    let path = format!("{V2_BASE}/groups/{project_id}/processes/{hostname}:{port}/measurements?granularity={granularity}&period={period}{metric_query}");

    let response: MeasurementsResponseDto = client.get_json(&path, media::ATLAS_V2_JSON, cancel).await?;

    Ok(response
        .measurements
        .into_iter()
        .map(|series| {
            let points = series
                .data_points
                .into_iter()
                .filter_map(|dp| dp.value.map(|value| MetricDataPoint { hostname: hostname.to_string(), timestamp: dp.timestamp, value }))
                .collect();
            (series.name, points)
        })
        .collect())
}

/// Disk/partition measurements on the `/api/atlas/v1.0` base. No configured
/// rule in this daemon targets a disk-partition metric by default, but the
/// control plane exposes the endpoint; kept for API completeness and for
/// any future disk-pressure rule.
pub async fn fetch_disk_measurements(
    client: &ApiClient,
    project_id: &str,
    hostname: &str,
    port: u16,
    partition_name: &str,
    metric_names: &[String],
    granularity: &str,
    period: &str,
    cancel: &CancellationToken,
) -> Result<Vec<(String, Vec<MetricDataPoint>)>, ControlPlaneError> {
    let metric_query: String = metric_names.iter().map(|m| format!("&m={m}")).collect();
    let path = format!(
        "{V1_BASE}/groups/{project_id}/processes/{hostname}:{port}/disks/{partition_name}/measurements?granularity={granularity}&period={period}{metric_query}"
    );

    let response: MeasurementsResponseDto = client.get_json(&path, media::ATLAS_V1_JSON, cancel).await?;

    Ok(response
        .measurements
        .into_iter()
        .map(|series| {
            let points = series
                .data_points
                .into_iter()
                .filter_map(|dp| dp.value.map(|value| MetricDataPoint { hostname: hostname.to_string(), timestamp: dp.timestamp, value }))
                .collect();
            (series.name, points)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reefscale_http::Credentials;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: String) -> ApiClient {
        ApiClient::new(base_url, Credentials { public_key: "pub".into(), private_key: "priv".into() }).unwrap()
    }

    #[tokio::test]
    async fn lists_projects_across_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/api/atlas/v2/groups.*pageNum=1.*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"id": "1", "name": "proj-a"}],
                "totalCount": 1,
                "resultsPerPage": 500,
            })))
            .mount(&server)
            .await;

        let client = client(server.uri());
        let cancel = CancellationToken::new();
        let projects = list_projects(&client, &cancel).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "proj-a");
    }

    #[tokio::test]
    async fn fetches_and_converts_measurements() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/api/atlas/v2/groups/1/processes/host1:27017/measurements.*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "measurements": [{
                    "name": "SYSTEM_NORMALIZED_CPU_USER",
                    "dataPoints": [
                        {"timestamp": "2026-01-01T00:00:00Z", "value": 0.91},
                        {"timestamp": "2026-01-01T00:01:00Z", "value": null},
                    ]
                }]
            })))
            .mount(&server)
            .await;

        let client = client(server.uri());
        let cancel = CancellationToken::new();
        let series = fetch_measurements(
            &client,
            "1",
            "host1",
            27017,
            &["SYSTEM_NORMALIZED_CPU_USER".to_string()],
            "PT1M",
            "PT10M",
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].0, "SYSTEM_NORMALIZED_CPU_USER");
        assert_eq!(series[0].1.len(), 1);
        assert!((series[0].1[0].value - 0.91).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn fetches_disk_measurements_from_the_v1_base() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/api/atlas/v1\.0/groups/1/processes/host1:27017/disks/disk0/measurements.*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "measurements": [{
                    "name": "DISK_PARTITION_SPACE_USED",
                    "dataPoints": [{"timestamp": "2026-01-01T00:00:00Z", "value": 72.0}]
                }]
            })))
            .mount(&server)
            .await;

        let client = client(server.uri());
        let cancel = CancellationToken::new();
        let series = fetch_disk_measurements(
            &client,
            "1",
            "host1",
            27017,
            "disk0",
            &["DISK_PARTITION_SPACE_USED".to_string()],
            "PT1M",
            "PT10M",
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].1[0].value, 72.0);
    }
}
