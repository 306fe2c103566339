//! Filter-expression and payload builders for the Sankhya gateway.
//!
//! Expressions are assembled by interpolating parameter values verbatim, the
//! same way the gateway's own query console does. The gateway evaluates them
//! as SQL, so values that reach these builders are trusted; anything
//! user-supplied must be vetted by the caller before it gets here.

use crate::models::{ParceirosQueryParams, TitulosQueryParams};
use serde_json::{json, Map, Value};

/// Receivables page size. The frontend pages in steps of 50.
pub const TITULOS_PAGE_SIZE: usize = 50;

pub const TITULOS_FIELDS: [&str; 14] = [
    "NUFIN",
    "CODPARC",
    "CODEMP",
    "VLRDESDOB",
    "DTVENC",
    "DTNEG",
    "PROVISAO",
    "DHBAIXA",
    "VLRBAIXA",
    "RECDESP",
    "NOSSONUM",
    "CODCTABCOINT",
    "HISTORICO",
    "NUMNOTA",
];

pub const PARCEIRO_FIELDS: [&str; 9] = [
    "CODPARC",
    "NOMEPARC",
    "RAZAOSOCIAL",
    "CGC_CPF",
    "CODCID",
    "ATIVO",
    "TIPPESSOA",
    "CODVEND",
    "CLIENTE",
];

pub const PRODUTO_FIELDS: [&str; 6] = [
    "CODPROD",
    "DESCRPROD",
    "REFERENCIA",
    "MARCA",
    "CODVOL",
    "ATIVO",
];

pub const ESTOQUE_FIELDS: [&str; 2] = ["CODLOCAL", "ESTOQUE"];

pub const ATIVIDADE_FIELDS: [&str; 10] = [
    "CODATIVIDADE",
    "CODLEAD",
    "TIPO",
    "DESCRICAO",
    "DADOS_COMPLEMENTARES",
    "CODUSUARIO",
    "COR",
    "DATA_INICIO",
    "DATA_FIM",
    "ATIVO",
];

pub const VENDEDOR_FIELDS: [&str; 6] =
    ["CODVEND", "APELIDO", "EMAIL", "TIPVEND", "CODGER", "ATIVO"];

/// Conjunctive filter expression, joined with ` AND `.
#[derive(Debug, Default)]
pub struct CriteriaBuilder {
    fragments: Vec<String>,
}

impl CriteriaBuilder {
    pub fn new() -> Self {
        Self {
            fragments: Vec::new(),
        }
    }

    pub fn push(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.fragments.push(fragment.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn build(&self) -> String {
        self.fragments.join(" AND ")
    }
}

/// Filter expression for the receivables listing.
///
/// Always restricts to revenue installments (`RECDESP = 1`) and the company
/// filter; everything else only contributes a fragment when the parameter
/// asks for it.
pub fn titulos_criteria(params: &TitulosQueryParams) -> String {
    let mut criteria = CriteriaBuilder::new();

    criteria.push("RECDESP = 1");
    criteria.push(format!("CODEMP = {}", params.codigo_empresa));

    if !params.codigo_parceiro.is_empty() {
        criteria.push(format!("CODPARC = {}", params.codigo_parceiro));
    }

    match params.status_financeiro.as_str() {
        "1" => {
            criteria.push("PROVISAO = 'N'");
        }
        "2" => {
            criteria.push("PROVISAO = 'S'");
        }
        // "3" keeps both Real and Provisão
        _ => {}
    }

    match params.tipo_financeiro.as_str() {
        "1" => {
            criteria.push("DHBAIXA IS NULL");
        }
        "2" => {
            criteria.push("DHBAIXA IS NOT NULL");
        }
        // "3" keeps both pending and settled
        _ => {}
    }

    if !params.data_negociacao_inicio.is_empty() {
        criteria.push(format!(
            "DTNEG >= TO_DATE('{}', 'YYYY-MM-DD')",
            params.data_negociacao_inicio
        ));
    }
    if !params.data_negociacao_final.is_empty() {
        criteria.push(format!(
            "DTNEG <= TO_DATE('{}', 'YYYY-MM-DD')",
            params.data_negociacao_final
        ));
    }

    criteria.build()
}

/// Filter expression for the paged partner listing.
pub fn parceiros_list_criteria(params: &ParceirosQueryParams) -> String {
    let mut criteria = CriteriaBuilder::new();

    criteria.push("CLIENTE = 'S'");
    criteria.push("ATIVO = 'S'");

    if !params.search_code.is_empty() {
        criteria.push(format!("CODPARC = {}", params.search_code));
    }
    if !params.search_name.is_empty() {
        criteria.push(format!(
            "UPPER(NOMEPARC) LIKE UPPER('%{}%')",
            params.search_name
        ));
    }
    if !params.cod_vendedor.is_empty() {
        if params.is_gerente == "true" {
            // Managers see their own partners plus their team's
            criteria.push(format!(
                "(CODVEND = {cod} OR CODVEND IN (SELECT CODVEND FROM TGFVEN WHERE CODGER = {cod}))",
                cod = params.cod_vendedor
            ));
        } else {
            criteria.push(format!("CODVEND = {}", params.cod_vendedor));
        }
    }

    criteria.build()
}

/// Filter expression for the partner quick search. A numeric term matches the
/// partner code exactly; anything else matches name or legal name.
pub fn parceiros_search_criteria(termo: &str) -> String {
    let mut criteria = CriteriaBuilder::new();

    criteria.push("CLIENTE = 'S'");
    criteria.push("ATIVO = 'S'");

    if termo.chars().all(|c| c.is_ascii_digit()) {
        criteria.push(format!("CODPARC = {}", termo));
    } else {
        criteria.push(format!(
            "(UPPER(NOMEPARC) LIKE UPPER('%{t}%') OR UPPER(RAZAOSOCIAL) LIKE UPPER('%{t}%'))",
            t = termo
        ));
    }

    criteria.build()
}

/// Filter expression for the product quick search.
pub fn produtos_search_criteria(termo: &str) -> String {
    let mut criteria = CriteriaBuilder::new();

    criteria.push("ATIVO = 'S'");

    if termo.chars().all(|c| c.is_ascii_digit()) {
        criteria.push(format!("CODPROD = {}", termo));
    } else {
        criteria.push(format!("UPPER(DESCRPROD) LIKE UPPER('%{}%')", termo));
    }

    criteria.build()
}

/// Filter expression for per-warehouse stock of one product.
pub fn estoque_criteria(cod_prod: &str) -> String {
    let mut criteria = CriteriaBuilder::new();
    criteria.push(format!("CODPROD = {}", cod_prod));
    criteria.build()
}

/// Filter expression for the lead-activity listing.
pub fn atividades_criteria(cod_lead: &str, ativo: &str) -> String {
    let mut criteria = CriteriaBuilder::new();

    criteria.push(format!("ATIVO = '{}'", ativo));
    if !cod_lead.is_empty() {
        criteria.push(format!("CODLEAD = {}", cod_lead));
    }

    criteria.build()
}

/// Filter expression for the seller listing.
pub fn vendedores_criteria(tipo: &str) -> String {
    let mut criteria = CriteriaBuilder::new();

    criteria.push("ATIVO = 'S'");
    match tipo {
        "vendedores" => {
            criteria.push("TIPVEND = 'V'");
        }
        "gerentes" => {
            criteria.push("TIPVEND = 'G'");
        }
        // "todos" lists every active seller
        _ => {}
    }

    criteria.build()
}

/// Filter expression resolving a seller by login e-mail.
pub fn vendedor_email_criteria(email: &str) -> String {
    let mut criteria = CriteriaBuilder::new();
    criteria.push("ATIVO = 'S'");
    criteria.push(format!("UPPER(EMAIL) = UPPER('{}')", email));
    criteria.build()
}

/// Current sale price of a product from the default price table.
pub fn preco_produto_sql(cod_prod: &str) -> String {
    format!(
        "SELECT VLRVENDA FROM TGFEXC WHERE CODPROD = {} AND NUTAB = \
         (SELECT MAX(NUTAB) FROM TGFTAB WHERE CODTAB = 0 AND DTVIGOR <= SYSDATE)",
        cod_prod
    )
}

/// Builds the `CRUDServiceProvider.loadRecords` request payload.
///
/// `offset` is the absolute record offset (the gateway's `offsetPage`), sent
/// as a string like every numeric knob in this payload.
pub fn load_records_payload(
    root_entity: &str,
    fields: &[&str],
    criteria: Option<&str>,
    order_by: Option<&str>,
    offset: usize,
    limit: usize,
) -> Value {
    let mut data_set = json!({
        "rootEntity": root_entity,
        "includePresentationFields": "N",
        "offsetPage": offset.to_string(),
        "limit": limit.to_string(),
        "entity": {
            "fieldset": {
                "list": fields.join(", ")
            }
        }
    });

    if let Some(expression) = criteria.filter(|c| !c.is_empty()) {
        data_set["criteria"] = json!({ "expression": { "$": expression } });
    }
    if let Some(expression) = order_by {
        data_set["orderBy"] = json!({ "expression": { "$": expression } });
    }

    json!({ "requestBody": { "dataSet": data_set } })
}

/// Builds the `DatasetSP.save` request payload for a single record.
///
/// `fields` and `values` are aligned by position; the values object is keyed
/// by field index and skips `None` slots, which is how generated columns
/// (the pk on insert) are left to the ERP. A `pk` pair turns the save into
/// an update. The response row comes back aligned with the full `fields`
/// list, generated values included.
pub fn save_record_payload(
    entity_name: &str,
    fields: &[&str],
    values: &[Option<Value>],
    pk: Option<(&str, &str)>,
) -> Value {
    debug_assert_eq!(fields.len(), values.len());

    let values_map: Map<String, Value> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.clone().map(|v| (i.to_string(), v)))
        .collect();

    let mut record = json!({ "values": values_map });
    if let Some((pk_field, pk_value)) = pk {
        record["pk"] = json!({ pk_field: pk_value });
    }

    json!({
        "serviceName": "DatasetSP.save",
        "requestBody": {
            "entityName": entity_name,
            "standAlone": false,
            "fields": fields,
            "records": [record]
        }
    })
}
