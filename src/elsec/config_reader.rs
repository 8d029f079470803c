use crate::elsec::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "datasetName")]
    pub dataset_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SectionSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "idProperty")]
    pub id_property: Option<String>,
    #[serde(rename = "districtProperty")]
    pub district_property: Option<String>,
    #[serde(rename = "municipalityProperty")]
    pub municipality_property: Option<String>,
}

impl SectionSource {
    pub fn new(file_path: &str) -> SectionSource {
        SectionSource {
            provider: "geojson".to_string(),
            file_path: file_path.to_string(),
            id_property: None,
            district_property: None,
            municipality_property: None,
        }
    }

    pub fn id_property(&self) -> &str {
        self.id_property.as_deref().unwrap_or("id")
    }

    pub fn district_property(&self) -> &str {
        self.district_property.as_deref().unwrap_or("district")
    }

    pub fn municipality_property(&self) -> &str {
        self.municipality_property
            .as_deref()
            .unwrap_or("municipality")
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectoralSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "sectionColumn")]
    pub section_column: Option<String>,
    #[serde(rename = "districtColumn")]
    pub district_column: Option<String>,
    #[serde(rename = "totalVotesColumn")]
    pub total_votes_column: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

impl ElectoralSource {
    pub fn new(provider: &str, file_path: &str) -> ElectoralSource {
        ElectoralSource {
            provider: provider.to_string(),
            file_path: file_path.to_string(),
            section_column: None,
            district_column: None,
            total_votes_column: None,
            excel_worksheet_name: None,
        }
    }

    pub fn section_column(&self) -> &str {
        self.section_column.as_deref().unwrap_or("section")
    }

    pub fn total_votes_column(&self) -> &str {
        self.total_votes_column.as_deref().unwrap_or("total")
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RecordSource {
    pub provider: String,
    pub kind: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "idColumn")]
    pub id_column: Option<String>,
    #[serde(rename = "longitudeColumn")]
    pub longitude_column: Option<String>,
    #[serde(rename = "latitudeColumn")]
    pub latitude_column: Option<String>,
    #[serde(rename = "sectionColumn")]
    pub section_column: Option<String>,
}

impl RecordSource {
    pub fn new(kind: &str, file_path: &str) -> RecordSource {
        RecordSource {
            provider: "csv".to_string(),
            kind: kind.to_string(),
            file_path: file_path.to_string(),
            id_column: None,
            longitude_column: None,
            latitude_column: None,
            section_column: None,
        }
    }

    pub fn record_kind(&self) -> ElsecResult<RecordKind> {
        match self.kind.as_str() {
            "leader" => Ok(RecordKind::Leader),
            "log" => Ok(RecordKind::LogEntry),
            x => whatever!("unknown record kind: {:?} (expected leader or log)", x),
        }
    }

    pub fn id_column(&self) -> &str {
        self.id_column.as_deref().unwrap_or("id")
    }

    pub fn longitude_column(&self) -> &str {
        self.longitude_column.as_deref().unwrap_or("longitude")
    }

    pub fn latitude_column(&self) -> &str {
        self.latitude_column.as_deref().unwrap_or("latitude")
    }

    pub fn section_column(&self) -> &str {
        self.section_column.as_deref().unwrap_or("section")
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElsecAlliance {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElsecRules {
    #[serde(default)]
    pub alliances: Vec<ElsecAlliance>,
    #[serde(rename = "trackedParties", default)]
    pub tracked_parties: Vec<String>,
    #[serde(rename = "swingThreshold")]
    pub swing_threshold: Option<f64>,
    #[serde(rename = "batchSize")]
    pub batch_size: Option<JSValue>,
    #[serde(rename = "parallelism")]
    pub parallelism: Option<JSValue>,
    #[serde(rename = "totalVotesProperty")]
    pub total_votes_property: Option<String>,
}

impl ElsecRules {
    pub fn total_votes_property(&self) -> &str {
        self.total_votes_property.as_deref().unwrap_or("TOTAL_VOTES")
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElsecConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "sectionSources")]
    pub section_sources: Vec<SectionSource>,
    #[serde(rename = "electoralSources", default)]
    pub electoral_sources: Vec<ElectoralSource>,
    #[serde(rename = "recordSources", default)]
    pub record_sources: Vec<RecordSource>,
    #[serde(default)]
    pub rules: ElsecRules,
}

pub fn read_config(path: &str) -> ElsecResult<ElsecConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: ElsecConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn read_summary(path: &str) -> ElsecResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

/// Converts the rules of the configuration file into the rules of the engine.
pub fn validate_rules(rules: &ElsecRules) -> ElsecResult<ReconcileRules> {
    let defaults = ReconcileRules::DEFAULT_RULES;
    let swing_threshold_percent = rules
        .swing_threshold
        .unwrap_or(defaults.swing_threshold_percent);
    if !swing_threshold_percent.is_finite() || swing_threshold_percent < 0.0 {
        whatever!(
            "swingThreshold must be a non-negative number, got {}",
            swing_threshold_percent
        );
    }
    let batch_size = read_js_int(&rules.batch_size)?.unwrap_or(defaults.batch_size);
    if batch_size == 0 {
        whatever!("batchSize must be at least 1");
    }
    Ok(ReconcileRules {
        alliances: rules
            .alliances
            .iter()
            .map(|a| AllianceDefinition {
                name: a.name.clone(),
                columns: a.columns.clone(),
            })
            .collect(),
        tracked_parties: rules.tracked_parties.clone(),
        swing_threshold_percent,
        batch_size,
        parallelism: read_js_int(&rules.parallelism)?.unwrap_or(defaults.parallelism),
    })
}

// Numbers may be written as JSON numbers or as strings.
fn read_js_int(x: &Option<JSValue>) -> ElsecResult<Option<usize>> {
    match x {
        None | Some(JSValue::Null) => Ok(None),
        Some(JSValue::Number(n)) => n
            .as_u64()
            .map(|x| Some(x as usize))
            .context(ParsingJsonNumberSnafu {
                value: n.to_string(),
            }),
        Some(JSValue::String(s)) => s
            .trim()
            .parse::<usize>()
            .ok()
            .map(Some)
            .context(ParsingJsonNumberSnafu { value: s.clone() }),
        Some(v) => ParsingJsonNumberSnafu {
            value: v.to_string(),
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config() {
        let js = r#"{
            "outputSettings": { "datasetName": "test" },
            "sectionSources": [ { "provider": "geojson", "filePath": "s.geojson" } ]
        }"#;
        let config: ElsecConfig = serde_json::from_str(js).unwrap();
        assert!(config.electoral_sources.is_empty());
        assert!(config.record_sources.is_empty());
        assert_eq!(config.section_sources[0].id_property(), "id");
        let rules = validate_rules(&config.rules).unwrap();
        assert_eq!(rules, ReconcileRules::DEFAULT_RULES);
    }

    #[test]
    fn rules_from_strings_and_numbers() {
        let js = r#"{
            "alliances": [ { "name": "pan_alliance", "columns": ["PAN_PRI"] } ],
            "trackedParties": ["PAN", "MORENA"],
            "swingThreshold": 10,
            "batchSize": "20",
            "parallelism": 2
        }"#;
        let rules: ElsecRules = serde_json::from_str(js).unwrap();
        let r = validate_rules(&rules).unwrap();
        assert_eq!(r.swing_threshold_percent, 10.0);
        assert_eq!(r.batch_size, 20);
        assert_eq!(r.parallelism, 2);
        assert_eq!(r.alliances[0].columns, vec!["PAN_PRI".to_string()]);
    }

    #[test]
    fn bad_rules() {
        let rules = ElsecRules {
            batch_size: Some(JSValue::String("many".to_string())),
            ..ElsecRules::default()
        };
        assert!(validate_rules(&rules).is_err());
        let rules = ElsecRules {
            swing_threshold: Some(-3.0),
            ..ElsecRules::default()
        };
        assert!(validate_rules(&rules).is_err());
    }

    #[test]
    fn record_kinds() {
        assert_eq!(
            RecordSource::new("log", "x.csv").record_kind().unwrap(),
            RecordKind::LogEntry
        );
        assert!(RecordSource::new("event", "x.csv").record_kind().is_err());
    }
}
