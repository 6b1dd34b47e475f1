use keycrm_tools::{CreatedLead, CrmApi, CrmPayment, ExternalTransaction, KeyCrmApiError, NewPipelineCard};
use mockall::mock;

mock! {
    pub Crm {}

    impl CrmApi for Crm {
        async fn create_pipeline_card(&self, card: &NewPipelineCard) -> Result<CreatedLead, KeyCrmApiError>;
        async fn list_external_transactions(
            &self,
            limit: u32,
            offset: u32,
        ) -> Result<Vec<ExternalTransaction>, KeyCrmApiError>;
        async fn attach_external_transaction(
            &self,
            payment_id: i64,
            transaction_id: i64,
        ) -> Result<(), KeyCrmApiError>;
        async fn update_payment_status<'a>(
            &self,
            payment_id: i64,
            status: &str,
            description: Option<&'a str>,
        ) -> Result<(), KeyCrmApiError>;
        async fn get_payments(&self, lead_id: i64) -> Result<Vec<CrmPayment>, KeyCrmApiError>;
    }
}
