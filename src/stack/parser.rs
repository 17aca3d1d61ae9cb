//! Stack file parser

use super::config::StackConfig;
use crate::error::{BerthError, Result};
use std::path::Path;

/// Default stack file names
pub const DEFAULT_STACK_FILES: &[&str] = &[
    "stack.yaml",
    "stack.yml",
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

/// Stack file parser
pub struct StackParser;

impl StackParser {
    /// Find a stack file in a directory
    pub fn find_stack_file(dir: &Path) -> Option<std::path::PathBuf> {
        for name in DEFAULT_STACK_FILES {
            let path = dir.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        None
    }

    /// Parse a stack file from a path
    pub fn parse_file(path: &Path) -> Result<StackConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BerthError::StackParse(format!("Failed to read file: {}", e)))?;

        Self::parse_str(&content)
    }

    /// Parse a stack file from a string
    pub fn parse_str(content: &str) -> Result<StackConfig> {
        serde_yaml::from_str(content)
            .map_err(|e| BerthError::StackParse(format!("Failed to parse YAML: {}", e)))
    }

    /// Validate a stack configuration
    ///
    /// Hard errors: a service without an image, or a dependency on a
    /// service that is not defined. Undefined network/volume references
    /// are warnings; they are created implicitly at startup.
    pub fn validate(config: &StackConfig) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        for (name, service) in &config.services {
            if service.image.is_none() {
                return Err(BerthError::StackParse(format!(
                    "Service '{}' must have an 'image' specified",
                    name
                )));
            }

            for dep in service.dependencies() {
                if !config.services.contains_key(&dep) {
                    return Err(BerthError::StackParse(format!(
                        "Service '{}' depends on unknown service '{}'",
                        name, dep
                    )));
                }
            }

            // Port and mount short syntax must parse
            service.port_mappings()?;

            for mount in service.volume_mounts()? {
                if !config.volumes.contains_key(&mount.volume) {
                    warnings.push(format!(
                        "Service '{}' references undefined volume '{}' (will be created)",
                        name, mount.volume
                    ));
                }
            }

            if let Some(networks) = &service.networks {
                for net in networks {
                    if net != "default" && !config.networks.contains_key(net) {
                        warnings.push(format!(
                            "Service '{}' references undefined network '{}' (will be created)",
                            name, net
                        ));
                    }
                }
            }
        }

        Ok(warnings)
    }

    /// Interpolate environment variables in a configuration
    pub fn interpolate(config: &mut StackConfig, env: &std::collections::HashMap<String, String>) {
        for service in config.services.values_mut() {
            if let Some(ref mut image) = service.image {
                *image = interpolate_string(image, env);
            }

            if let Some(ref mut environment) = service.environment {
                match environment {
                    super::config::EnvironmentConfig::Map(map) => {
                        for value in map.values_mut() {
                            if let Some(v) = value {
                                *v = interpolate_string(v, env);
                            }
                        }
                    }
                    super::config::EnvironmentConfig::Array(arr) => {
                        for item in arr.iter_mut() {
                            *item = interpolate_string(item, env);
                        }
                    }
                }
            }
        }
    }
}

/// Interpolate `${VAR}`, `$VAR` and `${VAR:-default}` in a string.
///
/// A reference to an unset variable with no default is left literal.
fn interpolate_string(s: &str, env: &std::collections::HashMap<String, String>) -> String {
    let re = regex::Regex::new(
        r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}|\$([A-Za-z_][A-Za-z0-9_]*)",
    )
    .unwrap();

    re.replace_all(s, |caps: &regex::Captures| {
        let var = caps
            .get(1)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();

        match env.get(var) {
            Some(value) => value.clone(),
            None => match caps.get(2) {
                Some(default) => default.as_str().to_string(),
                None => caps[0].to_string(),
            },
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_four_service_stack() {
        let yaml = r#"
name: demo
services:
  db:
    image: mongo:7
    ports:
      - "27017"
    volumes:
      - "db-data:/data/db"
  admin:
    image: mongo-express:latest
    ports:
      - "8082:8081"
    depends_on:
      - db
  web:
    image: demo-web:latest
    ports:
      - "8080:3000"
    depends_on:
      - db
  worker:
    image: demo-worker:latest
    depends_on:
      - db
volumes:
  db-data: {}
"#;

        let config = StackParser::parse_str(yaml).unwrap();
        assert_eq!(config.name.as_deref(), Some("demo"));
        assert_eq!(config.services.len(), 4);
        assert!(config.services.contains_key("db"));
        assert!(config.services.contains_key("worker"));

        let warnings = StackParser::validate(&config).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_validate_missing_image() {
        let yaml = r#"
services:
  web:
    ports:
      - "8080:3000"
"#;

        let config = StackParser::parse_str(yaml).unwrap();
        assert!(StackParser::validate(&config).is_err());
    }

    #[test]
    fn test_validate_unknown_dependency() {
        let yaml = r#"
services:
  web:
    image: demo-web:latest
    depends_on:
      - db
"#;

        let config = StackParser::parse_str(yaml).unwrap();
        assert!(StackParser::validate(&config).is_err());
    }

    #[test]
    fn test_validate_warns_on_undefined_volume() {
        let yaml = r#"
services:
  db:
    image: mongo:7
    volumes:
      - "db-data:/data/db"
"#;

        let config = StackParser::parse_str(yaml).unwrap();
        let warnings = StackParser::validate(&config).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("db-data"));
    }

    #[test]
    fn test_parse_depends_on_with_condition() {
        let yaml = r#"
services:
  db:
    image: mongo:7
  web:
    image: demo-web:latest
    depends_on:
      db:
        condition: service_started
"#;

        let config = StackParser::parse_str(yaml).unwrap();
        let web = &config.services["web"];
        assert_eq!(
            web.depends_condition("db"),
            super::super::config::DependsCondition::ServiceStarted
        );
    }

    #[test]
    fn test_interpolate() {
        use std::collections::HashMap;

        let mut env = HashMap::new();
        env.insert("TAG".to_string(), "7.0".to_string());

        let s = "mongo:${TAG}";
        assert_eq!(interpolate_string(s, &env), "mongo:7.0");
    }

    #[test]
    fn test_interpolate_default() {
        use std::collections::HashMap;

        let env = HashMap::new();
        let s = "mongo:${TAG:-latest}";
        assert_eq!(interpolate_string(s, &env), "mongo:latest");
    }

    #[test]
    fn test_interpolate_parsed_config() {
        use std::collections::HashMap;

        let yaml = r#"
services:
  db:
    image: "mongo:${MONGO_TAG:-7}"
    environment:
      MONGO_INITDB_ROOT_USERNAME: "${DB_USER}"
  worker:
    image: demo-worker:latest
    environment:
      - "DATABASE_URL=$WORKER_URL"
"#;

        let mut env = HashMap::new();
        env.insert("DB_USER".to_string(), "root".to_string());
        env.insert(
            "WORKER_URL".to_string(),
            "mongodb://db:27017/appdb".to_string(),
        );

        let mut config = StackParser::parse_str(yaml).unwrap();
        StackParser::interpolate(&mut config, &env);

        let db = &config.services["db"];
        assert_eq!(db.image.as_deref(), Some("mongo:7"));
        assert_eq!(
            db.env_map().get("MONGO_INITDB_ROOT_USERNAME").map(String::as_str),
            Some("root")
        );

        let worker = &config.services["worker"];
        assert_eq!(
            worker.env_map().get("DATABASE_URL").map(String::as_str),
            Some("mongodb://db:27017/appdb")
        );
    }

    #[test]
    fn test_interpolate_leaves_unset_variable_literal() {
        use std::collections::HashMap;

        let env = HashMap::new();
        assert_eq!(interpolate_string("mongo:${TAG}", &env), "mongo:${TAG}");
    }

    #[test]
    fn test_find_stack_file() {
        let temp = tempfile::tempdir().unwrap();
        assert!(StackParser::find_stack_file(temp.path()).is_none());

        std::fs::write(temp.path().join("stack.yaml"), "services: {}\n").unwrap();
        let found = StackParser::find_stack_file(temp.path()).unwrap();
        assert_eq!(found, temp.path().join("stack.yaml"));
    }
}
