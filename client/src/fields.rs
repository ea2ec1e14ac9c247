//! Dynamic category field engine
//!
//! Subcategories carry admin-defined field descriptors ([`Campo`]); values
//! are persisted as strings and typed locally. This module owns the wire
//! tag mapping, the string encoding for each field type, form building and
//! required-field validation, plus the category catalog service.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::endpoints;
use crate::error::{ApiError, ApiResult};
use crate::gateway::{decode, ApiGateway};
use crate::models::{
    Campo, CampoValor, CamposValorPayload, Categoria, Estado, Lista, ListaItem, Municipio,
    Subcategoria,
};

/// Field type as declared by the admin panel.
///
/// Unknown tags are preserved but behave as free text end to end, so a new
/// server-side type never breaks existing articles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TipoCampo {
    Texto,
    Numero,
    Fecha,
    Seleccion,
    SeleccionMultiple,
    AreaTexto,
    Casilla,
    Desconocido(String),
}

impl TipoCampo {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "text" => Self::Texto,
            "number" => Self::Numero,
            "date" => Self::Fecha,
            "select" => Self::Seleccion,
            "multiselect" => Self::SeleccionMultiple,
            "textarea" => Self::AreaTexto,
            "checkbox" => Self::Casilla,
            other => Self::Desconocido(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            Self::Texto => "text",
            Self::Numero => "number",
            Self::Fecha => "date",
            Self::Seleccion => "select",
            Self::SeleccionMultiple => "multiselect",
            Self::AreaTexto => "textarea",
            Self::Casilla => "checkbox",
            Self::Desconocido(tag) => tag,
        }
    }

    /// Whether this field draws its options from a [`Lista`]
    pub fn uses_lista(&self) -> bool {
        matches!(self, Self::Seleccion | Self::SeleccionMultiple)
    }
}

/// Locally typed field value; the wire carries only the encoded string
#[derive(Debug, Clone, PartialEq)]
pub enum CampoValorTipado {
    Texto(String),
    Numero(f64),
    Booleano(bool),
    /// Selected option labels, in selection order
    Lista(Vec<String>),
    Fecha(Option<NaiveDate>),
}

impl CampoValorTipado {
    /// Default value for an untouched field of the given type
    pub fn default_for(tipo: &TipoCampo) -> Self {
        match tipo {
            TipoCampo::Numero => Self::Numero(0.0),
            TipoCampo::Casilla => Self::Booleano(false),
            TipoCampo::SeleccionMultiple => Self::Lista(Vec::new()),
            TipoCampo::Fecha => Self::Fecha(None),
            _ => Self::Texto(String::new()),
        }
    }

    /// A value counts as filled when its scalar is non-empty or its list
    /// has at least one selection. Zero is a filled number; an unchecked
    /// checkbox is a filled boolean.
    pub fn is_filled(&self) -> bool {
        match self {
            Self::Texto(s) => !s.trim().is_empty(),
            Self::Fecha(d) => d.is_some(),
            Self::Lista(items) => !items.is_empty(),
            Self::Numero(_) | Self::Booleano(_) => true,
        }
    }
}

/// Decode a stored string into a typed value for the given field type.
///
/// Malformed numbers fall back to zero rather than failing the whole form.
pub fn decode_valor(tipo: &TipoCampo, raw: &str) -> CampoValorTipado {
    match tipo {
        TipoCampo::Numero => CampoValorTipado::Numero(raw.trim().parse().unwrap_or(0.0)),
        TipoCampo::Casilla => {
            CampoValorTipado::Booleano(matches!(raw.trim(), "true" | "1"))
        }
        TipoCampo::SeleccionMultiple => CampoValorTipado::Lista(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        TipoCampo::Fecha => CampoValorTipado::Fecha(parse_fecha(raw)),
        _ => CampoValorTipado::Texto(raw.to_string()),
    }
}

/// Stored dates are ISO days; datetime strings degrade to their day part
fn parse_fecha(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| raw.get(..10).and_then(|day| {
            NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
        }))
}

/// Encode a typed value back into the stored string form
pub fn encode_valor(value: &CampoValorTipado) -> String {
    match value {
        CampoValorTipado::Texto(s) => s.clone(),
        CampoValorTipado::Fecha(d) => d
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        CampoValorTipado::Numero(n) => {
            if n.fract() == 0.0 {
                format!("{}", *n as i64)
            } else {
                n.to_string()
            }
        }
        CampoValorTipado::Booleano(b) => b.to_string(),
        CampoValorTipado::Lista(items) => items.join(","),
    }
}

/// Toggle one option label in a multiselect value; the list stays a list
/// even when it empties out
pub fn toggle_seleccion(values: &mut Vec<String>, label: &str) {
    if let Some(pos) = values.iter().position(|v| v == label) {
        values.remove(pos);
    } else {
        values.push(label.to_string());
    }
}

/// Order fields for display: by `orden` ascending, unordered fields last,
/// ties keeping their server order
pub fn sort_by_orden(campos: &mut [Campo]) {
    campos.sort_by_key(|c| c.orden.unwrap_or(i64::MAX));
}

/// Typed working state of a dynamic-fields form, keyed by campoID
pub fn build_form_values(
    campos: &[Campo],
    stored: &[CampoValor],
) -> HashMap<i64, CampoValorTipado> {
    let by_id: HashMap<i64, &str> = stored
        .iter()
        .map(|v| (v.campo_id, v.valor.as_str()))
        .collect();

    campos
        .iter()
        .map(|campo| {
            let tipo = TipoCampo::from_tag(&campo.tipo);
            let value = match by_id.get(&campo.campo_id) {
                Some(raw) => decode_valor(&tipo, raw),
                None => CampoValorTipado::default_for(&tipo),
            };
            (campo.campo_id, value)
        })
        .collect()
}

/// Check that every required field is filled; the error names the missing
/// labels in display order
pub fn validate_form(
    campos: &[Campo],
    values: &HashMap<i64, CampoValorTipado>,
) -> ApiResult<()> {
    let mut ordered: Vec<&Campo> = campos.iter().filter(|c| c.requerido).collect();
    ordered.sort_by_key(|c| c.orden.unwrap_or(i64::MAX));

    let missing: Vec<&str> = ordered
        .iter()
        .filter(|campo| {
            values
                .get(&campo.campo_id)
                .map(|v| !v.is_filled())
                .unwrap_or(true)
        })
        .map(|campo| campo.label.as_str())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(format!(
            "Required fields missing: {}",
            missing.join(", ")
        )))
    }
}

/// Encode form state into the save payload, one row per known field
pub fn build_payload(
    articulo_id: &str,
    campos: &[Campo],
    values: &HashMap<i64, CampoValorTipado>,
) -> CamposValorPayload {
    let arr_campo_valor = campos
        .iter()
        .filter_map(|campo| {
            values.get(&campo.campo_id).map(|value| CampoValor {
                campo_id: campo.campo_id,
                valor: encode_valor(value),
            })
        })
        .collect();

    CamposValorPayload {
        articulo_id: articulo_id.to_string(),
        arr_campo_valor,
    }
}

/// Category catalog and dynamic-field persistence over the gateway.
///
/// Catalog reads go through the response cache; they change rarely and are
/// requested on every article form.
pub struct CategoryService {
    gateway: Arc<ApiGateway>,
}

impl CategoryService {
    pub fn new(gateway: Arc<ApiGateway>) -> Self {
        CategoryService { gateway }
    }

    pub async fn get_categorias(&self) -> ApiResult<Vec<Categoria>> {
        let body = self
            .gateway
            .get_cached(endpoints::GET_CATEGORIAS, None)
            .await?;
        decode(body)
    }

    pub async fn get_subcategorias(&self, categoria_id: i64) -> ApiResult<Vec<Subcategoria>> {
        let body = self
            .gateway
            .get_cached(&endpoints::subcategorias(categoria_id), None)
            .await?;
        decode(body)
    }

    /// Field descriptors for a subcategory, already in display order
    pub async fn get_campos(&self, subcategoria_id: i64) -> ApiResult<Vec<Campo>> {
        let body = self
            .gateway
            .get_cached(&endpoints::campos(subcategoria_id), None)
            .await?;
        let mut campos: Vec<Campo> = decode(body)?;
        sort_by_orden(&mut campos);
        Ok(campos)
    }

    pub async fn get_listas(&self) -> ApiResult<Vec<Lista>> {
        let body = self.gateway.get_cached(endpoints::GET_LISTAS, None).await?;
        decode(body)
    }

    pub async fn get_lista_items(&self, lista_id: i64) -> ApiResult<Vec<ListaItem>> {
        let body = self
            .gateway
            .get_cached(&endpoints::lista_items(lista_id), None)
            .await?;
        decode(body)
    }

    pub async fn get_estados(&self) -> ApiResult<Vec<Estado>> {
        let body = self.gateway.get_cached(endpoints::GET_ESTADOS, None).await?;
        decode(body)
    }

    pub async fn get_municipios(&self, estado_id: i64) -> ApiResult<Vec<Municipio>> {
        let body = self
            .gateway
            .get_cached(&endpoints::municipios(estado_id), None)
            .await?;
        decode(body)
    }

    /// Category options shaped for select inputs
    pub async fn get_categorias_select(&self) -> ApiResult<Vec<Categoria>> {
        let body = self
            .gateway
            .get_cached(endpoints::GET_CATEGORIAS_SELECT, None)
            .await?;
        decode(body)
    }

    pub async fn get_roles(&self) -> ApiResult<Vec<String>> {
        let body = self.gateway.get_cached(endpoints::GET_ROLES, None).await?;
        decode(body)
    }

    /// Field descriptors attached to an article's subcategory
    pub async fn get_campos_by_articulo(&self, articulo_id: &str) -> ApiResult<Vec<Campo>> {
        let body = self
            .gateway
            .get(&endpoints::articulo_campos(articulo_id))
            .await?;
        let mut campos: Vec<Campo> = decode(body)?;
        sort_by_orden(&mut campos);
        Ok(campos)
    }

    pub async fn get_campos_valor(&self, articulo_id: &str) -> ApiResult<Vec<CampoValor>> {
        let body = self
            .gateway
            .get(&endpoints::articulo_campos_valor(articulo_id))
            .await?;
        decode(body)
    }

    /// Validate and persist a form; stale cached values for the article are
    /// dropped on success
    pub async fn save_campos_valor(
        &self,
        articulo_id: &str,
        campos: &[Campo],
        values: &HashMap<i64, CampoValorTipado>,
    ) -> ApiResult<()> {
        validate_form(campos, values)?;

        let payload = build_payload(articulo_id, campos, values);
        debug!(articulo_id, fields = payload.arr_campo_valor.len(), "saving field values");
        self.gateway
            .post(endpoints::POST_CAMPOS_VALOR, &payload)
            .await?;
        self.gateway.invalidate_cache(articulo_id);
        Ok(())
    }
}
