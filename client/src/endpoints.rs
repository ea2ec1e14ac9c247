//! Endpoint map for the consumed REST API
//!
//! Path templates mirror the Subasta30 OpenAPI surface. Parameterized
//! endpoints are functions; fixed ones are constants.

use url::form_urlencoded;

// ===== Authentication =====
pub const LOGIN: &str = "/api/Login";
pub const LOGIN_REFRESH: &str = "/api/Login/Refresh";
pub const CREATE_COMPRADOR: &str = "/api/Login/CreateComprador";
pub const GENERA_LIGA_PASSWORD: &str = "/api/Login/GeneraLigaPassword";
pub const ESTABLECE_PASSWORD: &str = "/api/Login/EstablecePassword";

// ===== Articulos =====
pub const GET_ARTICULOS: &str = "/api/Articulos/GetArticulos";

pub fn articulo(id: &str) -> String {
    format!("/api/Articulos/GetArticulo/{id}")
}

pub fn articulo_web(id: &str) -> String {
    format!("/api/Articulos/GetArticuloWeb/{id}")
}

// Campos dinamicos
pub fn articulo_campos(id: &str) -> String {
    format!("/api/Articulos/GetCamposByArticuloID/{id}")
}

pub fn articulo_campos_valor(id: &str) -> String {
    format!("/api/Articulos/GetCamposValor/{id}")
}

pub const POST_CAMPOS_VALOR: &str = "/api/Articulos/PostCamposValor";

// Documentos
pub fn articulo_documentos(id: &str) -> String {
    format!("/api/Articulos/GetArticuloDocumentos/{id}")
}

pub const POST_DOCUMENTO_ARTICULO: &str = "/api/Articulos/PostDocumentoArticulo";

pub fn articulo_documento(id: &str) -> String {
    format!("/api/Articulos/GetArticuloDocumento/{id}")
}

pub fn delete_articulo_documento(id: &str) -> String {
    format!("/api/Articulos/DeleteArticuloDocumento/{id}")
}

// ===== Categorias =====
pub const GET_CATEGORIAS: &str = "/api/Categorias/GetCategorias";
pub const GET_LISTAS: &str = "/api/Categorias/GetListas";

pub fn subcategorias(categoria_id: i64) -> String {
    format!("/api/Categorias/GetSubcategorias/{categoria_id}")
}

pub fn campos(subcategoria_id: i64) -> String {
    format!("/api/Categorias/GetCampos/{subcategoria_id}")
}

pub fn lista_items(lista_id: i64) -> String {
    format!("/api/Categorias/GetListaItems/{lista_id}")
}

// ===== Pujas =====
pub const PUJAR: &str = "/api/Pujas/Pujar";

pub fn pujas_usuario(usuario_id: &str, torre_id: &str) -> String {
    format!("/api/Pujas/GetPujasUsuario/{usuario_id}/{torre_id}")
}

// ===== Subastas (public) =====
pub fn torre(torre_id: &str) -> String {
    format!("/api/Subasta/GetTorre/{torre_id}")
}

pub fn torres(subasta_id: &str) -> String {
    format!("/api/Subasta/GetTorres/{subasta_id}")
}

// ===== Search =====
pub const AUTOCOMPLETE: &str = "/api/Search/Autocomplete";
pub const GET_ALL_ACTIVE: &str = "/api/Search/GetAllActive";

pub fn search(query: &str) -> String {
    format!("/api/Search/GetSearch/{query}")
}

// ===== Compradores (admin) =====
pub const POST_DOCUMENTO_COMPRADOR: &str = "/api/Compradores/PostDocumentoComprador";

pub fn comprador_documentos(id: &str) -> String {
    format!("/api/Compradores/GetCompradorDocumentos/{id}")
}

pub fn comprador_documento(id: &str) -> String {
    format!("/api/Compradores/GetCompradorDocumento/{id}")
}

pub fn delete_comprador_documento(id: &str) -> String {
    format!("/api/Compradores/DeleteCompradorDocumento/{id}")
}

// ===== InfoComprador (self-service) =====
pub const INFO_GET_DOCUMENTOS: &str = "/api/InfoComprador/GetCompradorDocumentos";
pub const INFO_POST_DOCUMENTO: &str = "/api/InfoComprador/PostDocumentoComprador";

pub fn info_comprador_documento(id: &str) -> String {
    format!("/api/InfoComprador/GetCompradorDocumento/{id}")
}

pub fn info_delete_comprador_documento(id: &str) -> String {
    format!("/api/InfoComprador/DeleteCompradorDocumento/{id}")
}

// ===== Garantias =====
pub const POST_GARANTIA: &str = "/api/CompradorGarantias/PostGarantia";
pub const ADMIN_POST_GARANTIA: &str = "/api/CompradoresGarantias/PostGarantia";

pub fn garantia_file(id: i64) -> String {
    format!("/api/CompradorGarantias/GetGarantiaFile/{id}")
}

// ===== Ordenes de pago =====
pub const CREATE_ORDEN_PAGO_ITEM: &str = "/api/CompradorOrdenesPago/CreateOrdenPagoItemComprador";
pub const ADMIN_CREATE_ORDEN_PAGO_ITEM: &str = "/api/AdminPagos/CreateOrdenPagoItem";

pub fn orden_pago_documento(id: &str) -> String {
    format!("/api/CompradorOrdenesPago/GetDocumentoPago/{id}")
}

// ===== Clientes =====
pub const POST_DOCUMENTO_CLIENTE: &str = "/api/Clientes/PostClienteDocumento";

pub fn cliente_documentos(id: &str) -> String {
    format!("/api/Clientes/GetClienteDocumentos/{id}")
}

pub fn cliente_documento(id: &str) -> String {
    format!("/api/Clientes/GetClienteDocumento/{id}")
}

pub fn delete_cliente_documento(id: &str) -> String {
    format!("/api/Clientes/DeleteClienteDocumento/{id}")
}

// ===== Vendedor =====
pub fn subir_archivo(articulo_id: &str) -> String {
    format!("/api/Vendedor/SubirArchivo/{articulo_id}")
}

pub fn delete_imagen(imagen_id: &str) -> String {
    format!("/api/Vendedor/DeleteImagen/{imagen_id}")
}

pub fn lista_fotos(articulo_id: &str) -> String {
    format!("/api/Vendedor/GetListaFotos/{articulo_id}")
}

// ===== Genericos =====
pub const GET_ESTADOS: &str = "/api/Genericos/GetEstados";
pub const GET_CATEGORIAS_SELECT: &str = "/api/Genericos/GetCategoriasSelect";
pub const GET_ROLES: &str = "/api/Genericos/GetRoles";

pub fn municipios(estado_id: i64) -> String {
    format!("/api/Genericos/GetMunicipios/{estado_id}")
}

// ===== Query-string builders =====

/// Append query parameters to an endpoint, skipping empty values
pub fn build_url(endpoint: &str, params: &[(&str, String)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut any = false;

    for (key, value) in params {
        if value.is_empty() {
            continue;
        }
        serializer.append_pair(key, value);
        any = true;
    }

    if any {
        format!("{}?{}", endpoint, serializer.finish())
    } else {
        endpoint.to_string()
    }
}

/// Search endpoint with defaults merged in (page=1, pageSize=50,
/// sortBy=fecha)
pub fn build_search_url(query: &str, params: &[(&str, String)]) -> String {
    let mut merged: Vec<(&str, String)> = Vec::with_capacity(params.len() + 3);
    if !params.iter().any(|(k, _)| *k == "page") {
        merged.push(("page", "1".to_string()));
    }
    if !params.iter().any(|(k, _)| *k == "pageSize") {
        merged.push(("pageSize", "50".to_string()));
    }
    if !params.iter().any(|(k, _)| *k == "sortBy") {
        merged.push(("sortBy", "fecha".to_string()));
    }
    merged.extend(params.iter().map(|(k, v)| (*k, v.clone())));

    build_url(&search(query), &merged)
}

/// Autocomplete endpoint with term and result limit
pub fn build_autocomplete_url(term: &str, limit: u32) -> String {
    build_url(
        AUTOCOMPLETE,
        &[("term", term.to_string()), ("limit", limit.to_string())],
    )
}

/// Any endpoint with page/pageSize parameters
pub fn build_paginated_url(endpoint: &str, page: u32, page_size: u32) -> String {
    build_url(
        endpoint,
        &[("page", page.to_string()), ("pageSize", page_size.to_string())],
    )
}
