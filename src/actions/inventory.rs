//! Canned cloud resources standing in for a real query backend.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub resource_group: String,
    pub location: String,
}

impl Resource {
    fn new(name: &str, kind: Option<&str>, resource_group: &str, location: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.map(str::to_string),
            resource_group: resource_group.to_string(),
            location: location.to_string(),
        }
    }
}

const VIRTUAL_MACHINE_TYPE: &str = "Microsoft.Compute/virtualMachines";

pub fn virtual_machines() -> Vec<Resource> {
    vec![
        Resource::new("vm-prod-01", None, "rg-production", "eastus"),
        Resource::new("vm-dev-01", None, "rg-development", "westus2"),
        Resource::new("vm-test-01", None, "rg-testing", "centralus"),
    ]
}

/// Answers a KQL query from the canned inventory. Only virtual machine
/// lookups are recognised; every other query gets the sample resources.
pub fn run_query(query: &str) -> Vec<Resource> {
    if query.contains(VIRTUAL_MACHINE_TYPE) {
        return virtual_machines();
    }

    vec![
        Resource::new(
            "resource-1",
            Some("Microsoft.Storage/storageAccounts"),
            "rg-storage",
            "eastus",
        ),
        Resource::new("resource-2", Some("Microsoft.Web/sites"), "rg-web", "westus2"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_queries_return_virtual_machines() {
        let rows = run_query("Resources | where type =~ 'Microsoft.Compute/virtualMachines'");
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.kind.is_none()));
        assert_eq!(rows[0].name, "vm-prod-01");
    }

    #[test]
    fn other_queries_return_samples() {
        let rows = run_query("Resources | take 2");
        let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["resource-1", "resource-2"]);
        let json = serde_json::to_value(&rows[0]).expect("serialize");
        assert_eq!(json["type"], "Microsoft.Storage/storageAccounts");
        assert_eq!(json["resourceGroup"], "rg-storage");
    }
}
