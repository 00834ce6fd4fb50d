//! Role-scoped project parameters.
//!
//! Parameters travel as one flat map keyed by `{ROLE}_{paramKey}`. Keys are
//! only ever joined, never split back into role and key.

use std::collections::BTreeMap;

use shared::domain::ParameterMap;

/// A configurable numeric parameter for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterField {
    pub key: &'static str,
    pub label: &'static str,
}

const fn field(key: &'static str, label: &'static str) -> ParameterField {
    ParameterField { key, label }
}

const TARM_FIELDS: &[ParameterField] = &[
    field("removidos", "Quantidade de Removidos"),
    field("tempoRegulacao", "Tempo de Regulação TARM (segundos)"),
    field("pausasMensal", "Pausas Mensais (segundos)"),
];

const FROTA_FIELDS: &[ParameterField] = &[
    field("tempoSaidaVTR", "Saída VTR - Empenho (segundos)"),
    field("tempoRegulacaoFrota", "Tempo de Regulação Frota (segundos)"),
    field("pausasMensal", "Pausas Mensais (segundos)"),
];

const MEDICO_REGULADOR_FIELDS: &[ParameterField] = &[field(
    "tempoRegulacaoMedica",
    "Tempo de Regulação Médica (segundos)",
)];

const MEDICO_LIDER_FIELDS: &[ParameterField] = &[field(
    "tempoRegulacaoLider",
    "Tempo de Regulação Médica Líder (segundos)",
)];

/// Roles with configurable parameters, in display order.
pub const ROLE_PARAMETERS: &[(&str, &[ParameterField])] = &[
    ("TARM", TARM_FIELDS),
    ("FROTA", FROTA_FIELDS),
    ("MEDICO_REGULADOR_12H", MEDICO_REGULADOR_FIELDS),
    ("MEDICO_REGULADOR_24H", MEDICO_REGULADOR_FIELDS),
    ("MEDICO_LIDER_12H", MEDICO_LIDER_FIELDS),
    ("MEDICO_LIDER_24H", MEDICO_LIDER_FIELDS),
];

/// Keys seeded with `0` when a project is created.
pub const DEFAULT_PARAMETER_KEYS: &[&str] = &[
    "removidos",
    "pontosRemovidos",
    "tempoRegulacao",
    "pausasMensal",
    "tempoSaidaVTR",
    "tempoRegulacaoFrota",
    "tempoRegulacaoMedica",
    "tempoRegulacaoLider",
];

pub fn configured_roles() -> impl Iterator<Item = &'static str> {
    ROLE_PARAMETERS.iter().map(|(role, _)| *role)
}

/// Fields configured for `role`; empty for roles without parameters.
pub fn parameter_fields(role: &str) -> &'static [ParameterField] {
    ROLE_PARAMETERS
        .iter()
        .find(|(name, _)| *name == role)
        .map(|(_, fields)| *fields)
        .unwrap_or(&[])
}

pub fn default_project_parameters() -> ParameterMap {
    DEFAULT_PARAMETER_KEYS
        .iter()
        .map(|key| (key.to_string(), 0.0))
        .collect()
}

pub fn namespaced_key(role: &str, key: &str) -> String {
    format!("{role}_{key}")
}

/// Rewrites every `.` in a stored key to `_`. Idempotent.
pub fn normalize_key(key: &str) -> String {
    key.replace('.', "_")
}

pub fn normalize_parameters(parameters: &ParameterMap) -> ParameterMap {
    parameters
        .iter()
        .map(|(key, value)| (normalize_key(key), *value))
        .collect()
}

/// Shallow merge of `incoming` over `existing` after normalizing both sides.
///
/// Incoming keys win; keys absent from `incoming` survive untouched.
pub fn merge_parameters(existing: &ParameterMap, incoming: &ParameterMap) -> ParameterMap {
    let mut merged = normalize_parameters(existing);
    for (key, value) in incoming {
        merged.insert(normalize_key(key), *value);
    }
    merged
}

/// Flattens per-role form values (`paramKey -> value`) into namespaced keys.
pub fn flatten_role_values(role: &str, values: &BTreeMap<String, f64>) -> ParameterMap {
    values
        .iter()
        .map(|(key, value)| (namespaced_key(role, key), *value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(entries: &[(&str, f64)]) -> ParameterMap {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect()
    }

    #[test]
    fn merge_keeps_other_role_keys() {
        let existing = params(&[("TARM_removidos", 2.0), ("FROTA_tempoSaidaVTR", 10.0)]);
        let incoming = params(&[("TARM_removidos", 5.0)]);

        let merged = merge_parameters(&existing, &incoming);

        assert_eq!(
            merged,
            params(&[("TARM_removidos", 5.0), ("FROTA_tempoSaidaVTR", 10.0)])
        );
    }

    #[test]
    fn merge_normalizes_dotted_keys_on_both_sides() {
        let existing = params(&[("TARM.removidos", 2.0), ("FROTA.pausasMensal", 4.0)]);
        let incoming = params(&[("TARM.removidos", 7.0)]);

        let merged = merge_parameters(&existing, &incoming);

        assert_eq!(
            merged,
            params(&[("TARM_removidos", 7.0), ("FROTA_pausasMensal", 4.0)])
        );
        assert!(merged.keys().all(|key| !key.contains('.')));
    }

    #[test]
    fn normalize_key_is_idempotent() {
        for key in ["TARM.removidos", "a.b.c", "plain", "MEDICO_LIDER_12H.tempo", ""] {
            let once = normalize_key(key);
            assert_eq!(normalize_key(&once), once);
            assert!(!once.contains('.'));
        }
        assert_eq!(normalize_key("TARM.removidos"), "TARM_removidos");
    }

    #[test]
    fn flatten_namespaces_by_role() {
        let values = params(&[("tempoRegulacao", 300.0), ("pausasMensal", 0.0)]);
        let flat = flatten_role_values("TARM", &values);
        assert_eq!(
            flat,
            params(&[("TARM_tempoRegulacao", 300.0), ("TARM_pausasMensal", 0.0)])
        );
    }

    #[test]
    fn catalog_lookup() {
        assert_eq!(parameter_fields("TARM").len(), 3);
        assert_eq!(
            parameter_fields("MEDICO_LIDER_24H")[0].key,
            "tempoRegulacaoLider"
        );
        assert!(parameter_fields("UNKNOWN").is_empty());
        assert_eq!(configured_roles().count(), 6);
    }

    #[test]
    fn defaults_are_zeroed() {
        let defaults = default_project_parameters();
        assert_eq!(defaults.len(), DEFAULT_PARAMETER_KEYS.len());
        assert_eq!(defaults.get("removidos"), Some(&0.0));
        assert!(defaults.values().all(|value| *value == 0.0));
    }
}
