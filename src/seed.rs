//! Built-in seed collection.

use crate::types::{Resource, Status};

const CLOUD_RESOURCES: &[(&str, &str, &str, Status)] = &[
    ("1", "AWS EC2", "Compute", Status::Active),
    ("2", "Google Cloud Storage", "Storage", Status::Inactive),
    ("3", "Azure VM", "Compute", Status::Active),
    ("4", "AWS S3", "Storage", Status::Active),
    ("5", "Google Kubernetes Engine", "Container", Status::Active),
    ("6", "Azure Blob Storage", "Storage", Status::Inactive),
    ("7", "AWS Lambda", "Compute", Status::Active),
    ("8", "Google BigQuery", "Database", Status::Inactive),
    ("9", "Azure SQL Database", "Database", Status::Active),
    ("10", "AWS RDS", "Database", Status::Active),
    ("11", "Google Cloud Functions", "Compute", Status::Inactive),
    ("12", "Azure Functions", "Compute", Status::Active),
    ("13", "AWS DynamoDB", "Database", Status::Inactive),
    ("14", "Google Cloud Run", "Container", Status::Active),
    ("15", "Azure Kubernetes Service", "Container", Status::Active),
    ("16", "AWS Elastic Beanstalk", "Compute", Status::Active),
    ("17", "Google Firestore", "Database", Status::Inactive),
    ("18", "Azure Cosmos DB", "Database", Status::Active),
    ("19", "AWS Glacier", "Storage", Status::Inactive),
    ("20", "Google Cloud Spanner", "Database", Status::Active),
];

/// The default 20-item collection of cloud resources, in insertion order.
pub fn cloud_resources() -> Vec<Resource> {
    CLOUD_RESOURCES
        .iter()
        .map(|&(id, name, kind, status)| Resource::new(id, name, kind, status))
        .collect()
}
