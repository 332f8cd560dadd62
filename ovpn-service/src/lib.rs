//! # ovpn-service
//!
//! Everything that leaves the config file: restarting the OpenVPN unit,
//! issuing client certificates through easy-rsa, listing the certificate
//! index and rendering client profiles from templates.

pub mod certificates;
pub mod client_config;
pub mod error;
pub mod issuer;
pub mod service_manager;

pub use certificates::{list_certificates, parse_index, CertificateEntry, CertificateStatus};
pub use client_config::{export_profile, list_client_configs, render_profile, ClientProfile, RenderedProfile};
pub use error::{IssueError, ServiceError};
pub use issuer::{AnswerScript, CertificateIssuer, EasyRsaIssuer, IssuedCertificate};
pub use service_manager::{unit_name, RestartReport, ServiceManager, SystemctlManager};
