use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Priority, Product, Sector, Task};

// Wire types for the order backend. Field names follow the remote contract
// (Portuguese, camelCase); everything the client does not consume is ignored
// by serde.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetorDto {
    pub id: Option<i64>,
    pub nome: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClienteDto {
    pub id: Option<i64>,
    pub nome: Option<String>,
    pub documento: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ItemPedidoDto {
    pub id: Option<i64>,
    pub descricao: Option<String>,
    pub quantidade: Option<f64>,
    pub descricao_detalhada: Option<String>,
    pub cor_madeira: Option<String>,
    pub cor_revestimento: Option<String>,
    pub detalhes_medidas: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PedidoVendaDto {
    pub id: i64,
    pub numero: i64,
    pub descricao: Option<String>,
    pub prioridade: Option<String>,
    pub data_emissao: Option<String>,
    pub data_prevista: Option<String>,
    pub data_entrega: Option<String>,
    pub horas_estimadas: Option<f64>,
    pub total: Option<f64>,
    pub setor: Option<SetorDto>,
    pub cliente: Option<ClienteDto>,
    #[serde(default)]
    pub itens: Vec<ItemPedidoDto>,
}

impl PedidoVendaDto {
    /// Maps a fetched order onto the board's task model. The sector id goes
    /// through `Sector::from_remote_id`, so an order the remote has not
    /// routed yet lands in `usinagem`.
    pub fn into_task(self) -> Task {
        let sector = Sector::from_remote_id(self.setor.as_ref().and_then(|s| s.id));
        let priority = self
            .prioridade
            .as_deref()
            .and_then(parse_priority)
            .unwrap_or(Priority::Media);
        let created_at = self
            .data_emissao
            .as_deref()
            .and_then(parse_remote_timestamp)
            .unwrap_or_else(Utc::now);
        Task {
            id: self.id,
            order_number: format!("PED-{:03}", self.numero),
            client: self
                .cliente
                .and_then(|c| c.nome)
                .unwrap_or_default(),
            description: self.descricao.unwrap_or_default(),
            products: self.itens.into_iter().map(ItemPedidoDto::into_product).collect(),
            sector,
            priority,
            due_date: self.data_prevista.as_deref().and_then(parse_remote_date),
            estimated_hours: self.horas_estimadas,
            created_at,
            updated_at: None,
        }
    }
}

impl ItemPedidoDto {
    fn into_product(self) -> Product {
        // Remote quantities arrive as fractional numbers; the board always
        // shows at least one unit.
        let quantity = self
            .quantidade
            .map(|q| q.round().max(1.0) as u32)
            .unwrap_or(1);
        Product {
            id: self.id,
            name: self.descricao.unwrap_or_default(),
            quantity,
            wood_color: self.cor_madeira,
            coating_color: self.cor_revestimento,
            details: self.descricao_detalhada,
            measurement_details: self.detalhes_medidas,
        }
    }
}

fn parse_priority(raw: &str) -> Option<Priority> {
    match raw.to_lowercase().as_str() {
        "alta" => Some(Priority::Alta),
        "media" => Some(Priority::Media),
        "baixa" => Some(Priority::Baixa),
        _ => None,
    }
}

fn parse_remote_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// The backend serializes dates either as full timestamps or bare dates,
/// depending on the column. Accept both.
fn parse_remote_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    parse_remote_date(raw)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response of both `/auth/login` and `/auth/refresh`. A refresh response
/// with no `accessToken` is a refresh failure; a missing `refreshToken`
/// means the previous one stays valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSectorRequest {
    pub id_pedido: i64,
    pub id_novo_setor: i64,
}

/// Error body the backend may attach to a non-2xx response; `message` is
/// surfaced to the user verbatim when present.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteErrorBody {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPedidoPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub descricao: String,
    pub quantidade: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cor_madeira: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cor_revestimento: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descricao_detalhada: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detalhes_medidas: Option<String>,
}

/// Create/update body for `/pedidos-venda`. Items carrying an `id` are
/// field-level patches of known products; items without are inserts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PedidoVendaPayload {
    pub descricao: String,
    pub cliente: String,
    pub prioridade: String,
    pub id_setor: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_prevista: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horas_estimadas: Option<f64>,
    pub itens: Vec<ItemPedidoPayload>,
}

impl PedidoVendaPayload {
    pub fn from_task(task: &Task) -> Self {
        Self {
            descricao: task.description.clone(),
            cliente: task.client.clone(),
            prioridade: match task.priority {
                Priority::Alta => "alta",
                Priority::Media => "media",
                Priority::Baixa => "baixa",
            }
            .to_string(),
            id_setor: task.sector.remote_id(),
            data_prevista: task.due_date,
            horas_estimadas: task.estimated_hours,
            itens: task
                .products
                .iter()
                .map(|p| ItemPedidoPayload {
                    id: p.id,
                    descricao: p.name.clone(),
                    quantidade: p.quantity,
                    cor_madeira: p.wood_color.clone(),
                    cor_revestimento: p.coating_color.clone(),
                    descricao_detalhada: p.details.clone(),
                    detalhes_medidas: p.measurement_details.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dto(setor_id: Option<i64>) -> PedidoVendaDto {
        PedidoVendaDto {
            id: 42,
            numero: 7,
            descricao: Some("Cozinha planejada".into()),
            prioridade: Some("alta".into()),
            data_emissao: Some("2025-07-25".into()),
            data_prevista: Some("2025-09-01".into()),
            data_entrega: None,
            horas_estimadas: Some(60.0),
            total: Some(12_500.0),
            setor: setor_id.map(|id| SetorDto {
                id: Some(id),
                nome: None,
            }),
            cliente: Some(ClienteDto {
                id: Some(9),
                nome: Some("Carlos Souza".into()),
                documento: None,
            }),
            itens: vec![ItemPedidoDto {
                id: Some(1),
                descricao: Some("Armário Aéreo".into()),
                quantidade: Some(3.0),
                ..ItemPedidoDto::default()
            }],
        }
    }

    #[test]
    fn dto_maps_onto_task() {
        let task = sample_dto(Some(5)).into_task();
        assert_eq!(task.id, 42);
        assert_eq!(task.order_number, "PED-007");
        assert_eq!(task.client, "Carlos Souza");
        assert_eq!(task.sector, Sector::Lustracao);
        assert_eq!(task.priority, Priority::Alta);
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2025, 9, 1));
        assert_eq!(task.products.len(), 1);
        assert_eq!(task.products[0].quantity, 3);
    }

    #[test]
    fn unmapped_sector_defaults_to_first_stage() {
        assert_eq!(sample_dto(Some(77)).into_task().sector, Sector::Usinagem);
        assert_eq!(sample_dto(None).into_task().sector, Sector::Usinagem);
    }

    #[test]
    fn missing_priority_defaults_to_media() {
        let mut dto = sample_dto(Some(1));
        dto.prioridade = None;
        assert_eq!(dto.into_task().priority, Priority::Media);
    }

    #[test]
    fn update_sector_body_uses_remote_field_names() {
        let body = serde_json::to_value(UpdateSectorRequest {
            id_pedido: 42,
            id_novo_setor: 6,
        })
        .expect("serialize");
        assert_eq!(body["idPedido"], 42);
        assert_eq!(body["idNovoSetor"], 6);
    }
}
