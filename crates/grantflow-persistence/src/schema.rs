//! Esquema Diesel (declarado manualmente). Reemplazable con `diesel print-schema`.

diesel::table! {
    workflow (workflow_id) {
        workflow_id -> Uuid,
        workflow_type -> Text,
        current_workflow_state -> Text,
        is_active -> Bool,
        opportunity_id -> Nullable<Uuid>,
        application_id -> Nullable<Uuid>,
        application_submission_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    workflow_event_history (event_id) {
        event_id -> Uuid,
        payload -> Jsonb,
        received_at -> Timestamptz,
        is_successfully_processed -> Bool,
    }
}

diesel::table! {
    workflow_audit (audit_id) {
        audit_id -> Uuid,
        workflow_id -> Uuid,
        acting_user_id -> Uuid,
        transition_event -> Text,
        source_state -> Text,
        target_state -> Text,
        event_id -> Uuid,
        audit_metadata -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    workflow_approval (approval_id) {
        approval_id -> Uuid,
        workflow_id -> Uuid,
        approval_type -> Text,
        approving_user_id -> Uuid,
        approval_response_type -> Text,
        comment -> Nullable<Text>,
        is_still_valid -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(workflow_audit -> workflow (workflow_id));
diesel::joinable!(workflow_approval -> workflow (workflow_id));

diesel::allow_tables_to_appear_in_same_query!(
    workflow,
    workflow_event_history,
    workflow_audit,
    workflow_approval,
);
