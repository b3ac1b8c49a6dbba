//! Flattening of connection service responses.
//!
//! The API reports services per connection as a tree: connection → both
//! agents → each agent's services → each service's subnets, with the
//! connection's enabled-subnet list alongside. Resources and data sources work
//! with one flat [`SubnetRecord`] per subnet instead.

use serde::Serialize;

use crate::client::models::ConnectionServices;
use crate::mesh::MeshService;

/// One subnet of one service on one side of a connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubnetRecord {
    pub connection_group_id: i64,
    /// Agent exposing the service.
    pub agent_id: i64,
    pub service_id: i64,
    pub service_name: String,
    pub service_type: String,
    /// Service level flag, false when the API omits it.
    pub service_enabled: bool,
    pub subnet_id: i64,
    /// Subnet in CIDR notation.
    pub subnet_ip: String,
    /// Enablement of the subnet on this connection.
    pub subnet_enabled: bool,
}

impl From<&SubnetRecord> for MeshService {
    fn from(record: &SubnetRecord) -> Self {
        MeshService {
            id: record.subnet_id,
            name: record.service_name.clone(),
            ip: record.subnet_ip.clone(),
            service_type: record.service_type.clone(),
            enabled: record.subnet_enabled,
            agent_id: record.agent_id,
        }
    }
}

/// Enablement of `subnet_id` on `connection`.
///
/// A subnet missing from the connection's enabled-subnet list is disabled;
/// otherwise the listed flag is used as is.
pub fn subnet_enabled(connection: &ConnectionServices, subnet_id: i64) -> bool {
    connection
        .agent_connection_subnets
        .iter()
        .find(|s| s.agent_service_subnet_id == subnet_id)
        .map(|s| s.agent_connection_subnet_is_enabled)
        .unwrap_or(false)
}

/// Flatten one connection into subnet records, agent 1 first.
pub fn flatten(connection: &ConnectionServices) -> Vec<SubnetRecord> {
    let mut records = Vec::new();
    for agent in [&connection.agent_1, &connection.agent_2] {
        for service in &agent.agent_services {
            for subnet in &service.agent_service_subnets {
                records.push(SubnetRecord {
                    connection_group_id: connection.agent_connection_group_id,
                    agent_id: agent.agent_id,
                    service_id: service.agent_service_id,
                    service_name: service.agent_service_name.clone(),
                    service_type: service.agent_service_type.clone(),
                    service_enabled: service.agent_service_is_enabled,
                    subnet_id: subnet.agent_service_subnet_id,
                    subnet_ip: subnet.agent_service_subnet_ip.clone(),
                    subnet_enabled: subnet_enabled(connection, subnet.agent_service_subnet_id),
                });
            }
        }
    }
    records
}

/// Subnets exposed on a connection, in mesh state form.
pub fn mesh_services(connection: &ConnectionServices) -> Vec<MeshService> {
    flatten(connection).iter().map(MeshService::from).collect()
}

type Predicate<'a> = Box<dyn Fn(&SubnetRecord) -> bool + 'a>;

/// Optional constraints on flattened records. Unset fields match anything and
/// set fields are ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceFilter {
    pub agent_id: Option<i64>,
    pub service_name_substring: Option<String>,
    pub service_type: Option<String>,
    pub subnet_id: Option<i64>,
}

impl ServiceFilter {
    /// A filter that matches every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only records exposed by `agent_id`.
    pub fn agent_id(mut self, agent_id: i64) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    /// Only services whose name contains `needle`.
    pub fn service_name_substring(mut self, needle: impl Into<String>) -> Self {
        self.service_name_substring = Some(needle.into());
        self
    }

    /// Only services of exactly this type.
    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = Some(service_type.into());
        self
    }

    /// Only the subnet with this id.
    pub fn subnet_id(mut self, subnet_id: i64) -> Self {
        self.subnet_id = Some(subnet_id);
        self
    }

    fn predicates(&self) -> Vec<Predicate<'_>> {
        let mut predicates: Vec<Predicate<'_>> = Vec::new();
        if let Some(agent_id) = self.agent_id {
            predicates.push(Box::new(move |r| r.agent_id == agent_id));
        }
        if let Some(needle) = self.service_name_substring.as_deref() {
            predicates.push(Box::new(move |r| r.service_name.contains(needle)));
        }
        if let Some(service_type) = self.service_type.as_deref() {
            predicates.push(Box::new(move |r| r.service_type == service_type));
        }
        if let Some(subnet_id) = self.subnet_id {
            predicates.push(Box::new(move |r| r.subnet_id == subnet_id));
        }
        predicates
    }

    /// Whether `record` satisfies every set constraint.
    pub fn matches(&self, record: &SubnetRecord) -> bool {
        self.predicates().iter().all(|p| p(record))
    }

    /// Keep the records that satisfy every set constraint.
    pub fn apply(&self, records: Vec<SubnetRecord>) -> Vec<SubnetRecord> {
        let predicates = self.predicates();
        records
            .into_iter()
            .filter(|r| predicates.iter().all(|p| p(r)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::models::{
        AgentService, ConnectionSubnet, ServiceAgent, ServiceSubnet,
    };

    fn service(id: i64, name: &str, kind: &str, enabled: bool, subnets: &[(i64, &str)]) -> AgentService {
        AgentService {
            agent_service_id: id,
            agent_service_name: name.to_string(),
            agent_service_type: kind.to_string(),
            agent_service_is_enabled: enabled,
            agent_service_subnets: subnets
                .iter()
                .map(|(id, ip)| ServiceSubnet {
                    agent_service_subnet_id: *id,
                    agent_service_subnet_ip: ip.to_string(),
                })
                .collect(),
        }
    }

    /// web (enabled) on agent 1 with subnet S1, db (disabled) on agent 2 with S2.
    fn web_and_db() -> ConnectionServices {
        ConnectionServices {
            agent_connection_group_id: 42,
            agent_1: ServiceAgent {
                agent_id: 1,
                agent_services: vec![service(10, "web", "http", true, &[(101, "10.0.1.0/24")])],
            },
            agent_2: ServiceAgent {
                agent_id: 2,
                agent_services: vec![service(20, "db", "database", false, &[(202, "10.0.2.0/24")])],
            },
            agent_connection_subnets: vec![ConnectionSubnet {
                agent_service_subnet_id: 101,
                agent_connection_subnet_is_enabled: true,
            }],
        }
    }

    #[test]
    fn test_flatten_produces_one_record_per_subnet() {
        let records = flatten(&web_and_db());
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].agent_id, 1);
        assert_eq!(records[0].service_name, "web");
        assert!(records[0].service_enabled);
        assert!(records[0].subnet_enabled);
        assert_eq!(records[0].connection_group_id, 42);

        assert_eq!(records[1].agent_id, 2);
        assert_eq!(records[1].service_name, "db");
        assert!(!records[1].service_enabled);
        assert!(!records[1].subnet_enabled);
    }

    #[test]
    fn test_filter_by_service_type() {
        let records = ServiceFilter::new()
            .service_type("database")
            .apply(flatten(&web_and_db()));

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].service_name, "db");
        assert_eq!(records[0].subnet_id, 202);
    }

    #[test]
    fn test_filter_predicates_are_anded() {
        let all = flatten(&web_and_db());

        let filter = ServiceFilter::new().agent_id(1).service_name_substring("we");
        assert_eq!(filter.apply(all.clone()).len(), 1);

        let filter = ServiceFilter::new().agent_id(1).service_type("database");
        assert!(filter.apply(all.clone()).is_empty());

        let filter = ServiceFilter::new().subnet_id(202);
        assert!(filter.matches(&all[1]));
        assert!(!filter.matches(&all[0]));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let all = flatten(&web_and_db());
        assert_eq!(ServiceFilter::default().apply(all.clone()), all);
    }

    #[test]
    fn test_subnet_enablement_defaults() {
        let mut connection = web_and_db();
        // absent
        assert!(!subnet_enabled(&connection, 202));
        // present and true
        assert!(subnet_enabled(&connection, 101));
        // present and false
        connection.agent_connection_subnets.push(ConnectionSubnet {
            agent_service_subnet_id: 202,
            agent_connection_subnet_is_enabled: false,
        });
        assert!(!subnet_enabled(&connection, 202));
    }

    #[test]
    fn test_mesh_services_shape() {
        let services = mesh_services(&web_and_db());
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].id, 101);
        assert_eq!(services[0].service_type, "http");
        assert!(services[0].enabled);
        assert_eq!(services[1].agent_id, 2);
    }
}
