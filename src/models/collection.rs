use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tipos de registro que maneja la app (una colección por endpoint REST)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Tasks,
    Progress,
    Cravings,
    Consumption,
    Fatigue,
    Context,
    /// Calculado en el servidor, no tiene sentido offline
    Insights,
}

/// Registro estático de cada colección: nombre, ruta y capacidad offline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectionDescriptor {
    pub name: &'static str,
    pub path: &'static str,
    pub offline_capable: bool,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Tasks,
        Collection::Progress,
        Collection::Cravings,
        Collection::Consumption,
        Collection::Fatigue,
        Collection::Context,
        Collection::Insights,
    ];

    pub const fn descriptor(self) -> CollectionDescriptor {
        match self {
            Collection::Tasks => CollectionDescriptor {
                name: "tasks",
                path: "tasks",
                offline_capable: true,
            },
            Collection::Progress => CollectionDescriptor {
                name: "progress",
                path: "progress-entries",
                offline_capable: true,
            },
            Collection::Cravings => CollectionDescriptor {
                name: "cravings",
                path: "cravings",
                offline_capable: true,
            },
            Collection::Consumption => CollectionDescriptor {
                name: "consumption",
                path: "consumption-logs",
                offline_capable: true,
            },
            Collection::Fatigue => CollectionDescriptor {
                name: "fatigue",
                path: "fatigue-records",
                offline_capable: true,
            },
            Collection::Context => CollectionDescriptor {
                name: "context",
                path: "context-records",
                offline_capable: true,
            },
            Collection::Insights => CollectionDescriptor {
                name: "insights",
                path: "insights",
                offline_capable: false,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        self.descriptor().name
    }

    /// Ruta REST relativa (sin prefijo de API)
    pub fn path(self) -> &'static str {
        self.descriptor().path
    }

    /// Colecciones habilitadas offline por defecto
    pub fn offline_defaults() -> Vec<Collection> {
        Self::ALL
            .iter()
            .copied()
            .filter(|c| c.descriptor().offline_capable)
            .collect()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Colección desconocida: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insights_is_not_offline_capable() {
        let defaults = Collection::offline_defaults();
        assert!(!defaults.contains(&Collection::Insights));
        assert_eq!(defaults.len(), Collection::ALL.len() - 1);
    }

    #[test]
    fn parses_collection_names() {
        assert_eq!("progress".parse::<Collection>(), Ok(Collection::Progress));
        assert!("unknown".parse::<Collection>().is_err());
        assert_eq!(Collection::Consumption.path(), "consumption-logs");
    }
}
