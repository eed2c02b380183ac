//! Distributed virtual switch checks.

use super::discovery::{self, DvSwitchRow};
use super::{require, Endpoint, MetricResolver};
use crate::error::CheckError;
use crate::queries::{
    parse_params, validate_port_criteria, CustomQueryKey, CustomQueryKind, QueryMode,
};
use crate::types::{CheckResult, EntityKind};
use chrono::Utc;

impl MetricResolver {
    pub fn dvswitch_discovery(&self, endpoint: &Endpoint) -> CheckResult {
        self.run("dvswitch_discovery", endpoint, |s| {
            let rows: Vec<DvSwitchRow<'_>> =
                s.snapshot.dv_switches().iter().map(DvSwitchRow::from).collect();
            discovery::to_json(&rows)
        })
    }

    /// Ports of a distributed switch matching `key`, as JSON text.
    ///
    /// `key` is a comma separated list of `criterion:value` pairs. The first
    /// request registers a custom query and yields nothing; the collector
    /// answers it on its next cycle. The key is only validated on that first
    /// request.
    pub fn dvswitch_fetchports(
        &self,
        endpoint: &Endpoint,
        uuid: &str,
        key: Option<&str>,
        mode: Option<&str>,
    ) -> CheckResult {
        let uuid = require(uuid, "second")?;
        let mode = mode.map(str::parse::<QueryMode>).transpose()?.unwrap_or_default();
        let key = key.unwrap_or("");

        self.run("dvswitch_fetchports", endpoint, |s| {
            let dv_switch = s.snapshot.dv_switch_by_uuid(uuid).ok_or(CheckError::UnknownDvSwitch)?;
            let version = s.snapshot.version();
            let query = CustomQueryKey {
                entity_kind: EntityKind::DistributedVirtualSwitch,
                entity_id: dv_switch.id.clone(),
                key: key.to_string(),
                query_kind: CustomQueryKind::DvSwitchFetchPorts,
                mode,
            };

            s.queries.get_or_register(
                query,
                || {
                    let params = parse_params(key)?;
                    validate_port_criteria(&params, version)?;
                    Ok(params)
                },
                Utc::now(),
            )
        })
    }
}
