/// Draft/publish service used by the HTTP layer
pub mod topology_service;
