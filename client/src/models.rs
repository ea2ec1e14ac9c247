//! Data model for the auction marketplace API
//!
//! Serde DTOs matching the wire shapes of the Subasta30 API. Field names on
//! the wire keep the API's `camelCase`-with-`ID` convention, so the ID
//! fields carry explicit renames.

use serde::{Deserialize, Serialize};

// ===== Authentication =====

/// Credentials payload for POST /api/Login
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Always "web" for this client
    pub app: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            app: "web".to_string(),
        }
    }
}

/// Payload for POST /api/Login/Refresh
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest {
    pub token: String,
    pub app: String,
}

impl RefreshRequest {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            app: "web".to_string(),
        }
    }
}

/// Token bundle returned by login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthData {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<Usuario>,
}

/// Logged-in user record as stored client-side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usuario {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(rename = "compradorID", default)]
    pub comprador_id: Option<String>,
}

// ===== Articulos =====

/// Article lifecycle status (numeric on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstatusArticulo {
    Borrador,
    Publicado,
    EnSubasta,
    Vendido,
    Cancelado,
}

impl EstatusArticulo {
    /// Map the wire's numeric status ID; unknown IDs yield `None`
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::Borrador),
            2 => Some(Self::Publicado),
            3 => Some(Self::EnSubasta),
            4 => Some(Self::Vendido),
            5 => Some(Self::Cancelado),
            _ => None,
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Self::Borrador => 1,
            Self::Publicado => 2,
            Self::EnSubasta => 3,
            Self::Vendido => 4,
            Self::Cancelado => 5,
        }
    }

    /// Sold articles are immutable from the client's perspective
    pub fn es_final(self) -> bool {
        matches!(self, Self::Vendido | Self::Cancelado)
    }
}

/// Auction article detail
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Articulo {
    #[serde(rename = "articuloID", default)]
    pub articulo_id: String,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub descripcion: String,
    #[serde(rename = "montoSalida", default)]
    pub monto_salida: f64,
    #[serde(rename = "pujaActual", default)]
    pub puja_actual: Option<f64>,
    #[serde(rename = "estatusArticuloID", default)]
    pub estatus_articulo_id: i64,
    #[serde(rename = "clienteID", default)]
    pub cliente_id: Option<String>,
    #[serde(rename = "subcategoriaID", default)]
    pub subcategoria_id: Option<i64>,
    #[serde(rename = "urlImgPrincipal", default)]
    pub url_img_principal: Option<String>,
    #[serde(rename = "esDestacado", default)]
    pub es_destacado: bool,
    #[serde(rename = "fechaCaptura", default)]
    pub fecha_captura: Option<String>,
    /// Auction end, ISO-8601; absent while the article is not in auction
    #[serde(rename = "fechaFin", default)]
    pub fecha_fin: Option<String>,
    #[serde(default)]
    pub activo: Option<bool>,
    #[serde(default)]
    pub documentos: Vec<Documento>,
    #[serde(default)]
    pub valores: Vec<CampoValor>,
}

impl Articulo {
    pub fn estatus(&self) -> Option<EstatusArticulo> {
        EstatusArticulo::from_id(self.estatus_articulo_id)
    }

    /// Current bid if any, otherwise the starting amount
    pub fn precio_actual(&self) -> f64 {
        self.puja_actual.unwrap_or(self.monto_salida)
    }
}

// ===== Subastas y pujas =====

/// Auction tower (one article under the hammer)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Torre {
    #[serde(rename = "torreID", default)]
    pub torre_id: String,
    #[serde(rename = "numeroTorre", default)]
    pub numero_torre: i64,
    #[serde(rename = "subastaID", default)]
    pub subasta_id: String,
    #[serde(rename = "articuloID", default)]
    pub articulo_id: String,
    #[serde(rename = "fechaInicio", default)]
    pub fecha_inicio: Option<String>,
    #[serde(rename = "fechaFin", default)]
    pub fecha_fin: Option<String>,
    #[serde(rename = "montoActual", default)]
    pub monto_actual: f64,
    #[serde(rename = "compradorGanador", default)]
    pub comprador_ganador: Option<String>,
    #[serde(rename = "estatusTorre", default)]
    pub estatus_torre: Option<String>,
}

/// A bid as reported by the server; the client never mutates history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Puja {
    #[serde(rename = "pujaID", default)]
    pub puja_id: String,
    #[serde(rename = "torreID", default)]
    pub torre_id: String,
    #[serde(rename = "compradorID", default)]
    pub comprador_id: String,
    pub monto: f64,
    #[serde(rename = "fechaPuja", default)]
    pub fecha_puja: String,
    #[serde(rename = "esGanadora", default)]
    pub es_ganadora: bool,
}

/// Payload for POST /api/Pujas/Pujar
#[derive(Debug, Clone, Serialize)]
pub struct PostPuja {
    #[serde(rename = "torreID")]
    pub torre_id: String,
    pub monto: f64,
}

/// Display order for bid history: amount descending, then time descending.
/// Ties keep their incoming order.
pub fn sort_pujas_for_display(pujas: &mut [Puja]) {
    pujas.sort_by(|a, b| {
        b.monto
            .total_cmp(&a.monto)
            .then_with(|| b.fecha_puja.cmp(&a.fecha_puja))
    });
}

// ===== Categorias y campos =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Categoria {
    #[serde(rename = "categoriaID", default)]
    pub categoria_id: i64,
    #[serde(default)]
    pub nombre: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subcategoria {
    #[serde(rename = "subcategoriaID", default)]
    pub subcategoria_id: i64,
    #[serde(rename = "categoriaID", default)]
    pub categoria_id: i64,
    #[serde(default)]
    pub nombre: String,
}

/// Dynamic field descriptor attached to a subcategory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campo {
    #[serde(rename = "campoID", default)]
    pub campo_id: i64,
    #[serde(rename = "subcategoriaID", default)]
    pub subcategoria_id: i64,
    #[serde(default)]
    pub label: String,
    /// Wire type tag, e.g. "text", "multiselect"
    #[serde(default)]
    pub tipo: String,
    #[serde(rename = "listaID", default)]
    pub lista_id: Option<i64>,
    #[serde(default)]
    pub orden: Option<i64>,
    #[serde(default)]
    pub requerido: bool,
}

/// Stored string-encoded value for one (article, field) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampoValor {
    #[serde(rename = "campoID")]
    pub campo_id: i64,
    #[serde(default)]
    pub valor: String,
}

/// Payload for POST /api/Articulos/PostCamposValor
#[derive(Debug, Clone, Serialize)]
pub struct CamposValorPayload {
    #[serde(rename = "articuloID")]
    pub articulo_id: String,
    #[serde(rename = "arrCampoValor")]
    pub arr_campo_valor: Vec<CampoValor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lista {
    #[serde(rename = "listaID", default)]
    pub lista_id: i64,
    #[serde(default)]
    pub nombre: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListaItem {
    #[serde(rename = "listaItemID", default)]
    pub lista_item_id: i64,
    #[serde(rename = "listaID", default)]
    pub lista_id: i64,
    #[serde(default)]
    pub nombre: String,
}

// ===== Documentos =====

/// Uploaded document or image attached to an article, buyer or client
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Documento {
    #[serde(rename = "articuloDocumentoID", default)]
    pub documento_id: String,
    #[serde(rename = "articuloID", default)]
    pub articulo_id: Option<String>,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "urlCompleta", default)]
    pub url_completa: Option<String>,
    #[serde(default)]
    pub tipo: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(rename = "fechaCarga", default)]
    pub fecha_carga: Option<String>,
    #[serde(rename = "esPrincipal", default)]
    pub es_principal: bool,
    #[serde(rename = "marcadoEliminar", default)]
    pub marcado_eliminar: bool,
}

/// Keep at most one principal image in a local gallery list. Optimistic
/// client-side invariant; the server is not known to enforce it.
pub fn marcar_principal(documentos: &mut [Documento], documento_id: &str) {
    for doc in documentos.iter_mut() {
        doc.es_principal = doc.documento_id == documento_id;
    }
}

// ===== Ubicaciones =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estado {
    #[serde(rename = "estadoID", default)]
    pub estado_id: i64,
    #[serde(default)]
    pub nombre: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Municipio {
    #[serde(rename = "municipioID", default)]
    pub municipio_id: i64,
    #[serde(rename = "estadoID", default)]
    pub estado_id: i64,
    #[serde(default)]
    pub nombre: String,
}

// ===== Paginacion =====

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Paginacion {
    #[serde(rename = "paginaActual", default)]
    pub pagina_actual: u32,
    #[serde(rename = "tamanoPagina", default)]
    pub tamano_pagina: u32,
    #[serde(rename = "totalRegistros", default)]
    pub total_registros: u64,
    #[serde(rename = "totalPaginas", default)]
    pub total_paginas: u32,
    #[serde(rename = "tienePaginaSiguiente", default)]
    pub tiene_pagina_siguiente: bool,
    #[serde(rename = "tienePaginaAnterior", default)]
    pub tiene_pagina_anterior: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    #[serde(default = "Vec::new")]
    pub datos: Vec<T>,
    #[serde(default)]
    pub paginacion: Option<Paginacion>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn puja(monto: f64, fecha: &str) -> Puja {
        Puja {
            puja_id: String::new(),
            torre_id: String::new(),
            comprador_id: String::new(),
            monto,
            fecha_puja: fecha.to_string(),
            es_ganadora: false,
        }
    }

    #[test]
    fn pujas_sort_amount_desc_then_time_desc() {
        let mut pujas = vec![
            puja(1000.0, "2025-01-01T10:00:00Z"),
            puja(1200.0, "2025-01-01T09:00:00Z"),
            puja(1000.0, "2025-01-01T12:00:00Z"),
        ];

        sort_pujas_for_display(&mut pujas);

        assert_eq!(pujas[0].monto, 1200.0);
        assert_eq!(pujas[1].fecha_puja, "2025-01-01T12:00:00Z");
        assert_eq!(pujas[2].fecha_puja, "2025-01-01T10:00:00Z");
    }

    #[test]
    fn estatus_round_trips_and_flags_final_states() {
        assert_eq!(EstatusArticulo::from_id(3), Some(EstatusArticulo::EnSubasta));
        assert_eq!(EstatusArticulo::from_id(9), None);
        assert_eq!(EstatusArticulo::Vendido.id(), 4);
        assert!(EstatusArticulo::Vendido.es_final());
        assert!(!EstatusArticulo::Publicado.es_final());
    }

    #[test]
    fn marcar_principal_keeps_single_flag() {
        let mut docs = vec![
            Documento {
                documento_id: "a".into(),
                es_principal: true,
                ..Default::default()
            },
            Documento {
                documento_id: "b".into(),
                ..Default::default()
            },
        ];

        marcar_principal(&mut docs, "b");

        assert!(!docs[0].es_principal);
        assert!(docs[1].es_principal);
    }

    #[test]
    fn articulo_deserializes_wire_names() {
        let articulo: Articulo = serde_json::from_value(serde_json::json!({
            "articuloID": "abc-123",
            "nombre": "BMW Serie 3",
            "montoSalida": 150000.0,
            "estatusArticuloID": 3,
            "fechaFin": "2026-09-01T18:00:00Z"
        }))
        .unwrap();

        assert_eq!(articulo.articulo_id, "abc-123");
        assert_eq!(articulo.estatus(), Some(EstatusArticulo::EnSubasta));
        assert_eq!(articulo.precio_actual(), 150000.0);
    }
}
