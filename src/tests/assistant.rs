use super::{
    is_applicable, suggested_excerpt, AssistantState, EditorAssistant, SessionContext, TurnOutcome,
};
use crate::buffer::RichBuffer;
use crate::cache::RefreshPolicy;
use crate::formats::MarkupKind;
use crate::llm::{
    CompletionClient, CompletionReply, CompletionRequest, LlmError, Operation, CONTINGENCY_MESSAGE,
};
use crate::service::DocumentService;
use crate::transcript::{Author, FeedbackError};

fn service(text: &str) -> DocumentService<RichBuffer> {
    DocumentService::new(
        RichBuffer::from_plain(text),
        MarkupKind::Html,
        RefreshPolicy::default(),
    )
}

fn assistant() -> EditorAssistant {
    EditorAssistant::new(SessionContext::default(), 20)
}

fn last_reply(assistant: &EditorAssistant) -> &str {
    &assistant.transcript().last().unwrap().content
}

fn reply(text: &str) -> CompletionReply {
    CompletionReply {
        reply: text.to_string(),
        model_used: Some("modelo-teste".to_string()),
        token_usage: None,
        analysis: None,
    }
}

/// Answers every request with a fixed reply.
struct Canned(&'static str);

impl CompletionClient for Canned {
    fn complete(&self, _request: &CompletionRequest) -> Result<CompletionReply, LlmError> {
        Ok(reply(self.0))
    }
}

/// Never reachable.
struct Down;

impl CompletionClient for Down {
    fn complete(&self, _request: &CompletionRequest) -> Result<CompletionReply, LlmError> {
        Err(LlmError::Transport("connection refused".to_string()))
    }
}

#[test]
fn test_single_match_is_replaced_at_once() {
    let mut doc = service("Citem-se o réu.");
    let mut bot = assistant();
    let outcome = bot.submit(r#"substitua "réu" por "requerido""#, &mut doc);

    assert_eq!(outcome, TurnOutcome::Handled);
    assert_eq!(doc.live_text(), "Citem-se o requerido.");
    assert_eq!(last_reply(&bot), r#"Substituí "réu" por "requerido"."#);
    assert_eq!(bot.state(), AssistantState::Idle);
    assert_eq!(bot.transcript().len(), 2);
}

#[test]
fn test_missing_target_is_reported() {
    let mut doc = service("Citem-se o réu.");
    let mut bot = assistant();
    bot.submit(r#"substitua "autor" por "requerente""#, &mut doc);
    assert_eq!(last_reply(&bot), r#"Não encontrei "autor" no documento."#);
    assert_eq!(doc.live_text(), "Citem-se o réu.");
    assert_eq!(bot.state(), AssistantState::Idle);
}

#[test]
fn test_several_matches_ask_which_one() {
    let mut doc = service("o réu contestou; o réu recorreu");
    let mut bot = assistant();
    bot.submit(r#"substitua "réu" por "requerido""#, &mut doc);

    assert_eq!(bot.state(), AssistantState::AwaitingDisambiguation);
    let prompt = last_reply(&bot);
    assert!(prompt.starts_with(r#"Encontrei 2 ocorrências de "réu"."#));
    assert!(prompt.contains("\n1. o **réu** contestou; o réu re…"));
    assert!(prompt.contains("\n2. "));
    assert_eq!(bot.pending().unwrap().occurrences.len(), 2);

    bot.submit("2", &mut doc);
    assert_eq!(doc.live_text(), "o réu contestou; o requerido recorreu");
    assert_eq!(
        last_reply(&bot),
        r#"Substituí a ocorrência 2 de "réu" por "requerido"."#
    );
    assert_eq!(bot.state(), AssistantState::Idle);
}

#[test]
fn test_all_matches_can_be_replaced() {
    let mut doc = service("o réu contestou; o réu recorreu");
    let mut bot = assistant();
    bot.submit(r#"substitua "réu" por "requerido""#, &mut doc);
    bot.submit("todas", &mut doc);

    assert_eq!(doc.live_text(), "o requerido contestou; o requerido recorreu");
    assert_eq!(
        last_reply(&bot),
        r#"Substituí 2 de 2 ocorrências de "réu" por "requerido"."#
    );
    assert!(bot.pending().is_none());
}

#[test]
fn test_picking_one_of_three_leaves_the_others() {
    let mut doc = service("foo a foo b foo");
    let mut bot = assistant();
    bot.submit(r#"replace "foo" with "bar""#, &mut doc);
    assert_eq!(bot.pending().unwrap().occurrences.len(), 3);
    assert!(last_reply(&bot).contains("\n3. "));

    bot.submit("2", &mut doc);
    assert_eq!(doc.live_text(), "foo a bar b foo");
    assert_eq!(bot.state(), AssistantState::Idle);
}

#[test]
fn test_all_of_three_are_replaced() {
    let mut doc = service("foo a foo b foo");
    let mut bot = assistant();
    bot.submit(r#"replace "foo" with "bar""#, &mut doc);
    bot.submit("all", &mut doc);

    let text = doc.live_text();
    assert_eq!(text, "bar a bar b bar");
    assert_eq!(text.matches("foo").count(), 0);
    assert_eq!(text.matches("bar").count(), 3);
    assert!(bot.pending().is_none());
}

#[test]
fn test_unclear_choice_asks_again_and_cancel_drops_it() {
    let mut doc = service("o réu contestou; o réu recorreu");
    let mut bot = assistant();
    bot.submit(r#"substitua "réu" por "requerido""#, &mut doc);

    assert_eq!(bot.submit("talvez", &mut doc), TurnOutcome::Handled);
    assert_eq!(
        last_reply(&bot),
        r#"Não entendi. Responda com um número de 1 a 2, "todas" ou "cancelar"."#
    );
    assert_eq!(bot.state(), AssistantState::AwaitingDisambiguation);

    bot.submit("7", &mut doc);
    assert_eq!(bot.state(), AssistantState::AwaitingDisambiguation);

    bot.submit("cancelar", &mut doc);
    assert_eq!(last_reply(&bot), "Substituição cancelada.");
    assert_eq!(bot.state(), AssistantState::Idle);
    assert_eq!(doc.live_text(), "o réu contestou; o réu recorreu");
}

#[test]
fn test_new_command_supersedes_the_pending_choice() {
    let mut doc = service("o réu contestou; o réu recorreu");
    let mut bot = assistant();
    bot.submit(r#"substitua "réu" por "requerido""#, &mut doc);
    bot.submit(r#"substitua "contestou" por "apelou""#, &mut doc);

    assert!(bot.pending().is_none());
    assert_eq!(doc.live_text(), "o réu apelou; o réu recorreu");
}

#[test]
fn test_move_block_after_anchor() {
    let mut doc = service("A. B. C.");
    let mut bot = assistant();
    bot.submit(r#"mova "A." para depois de "C.""#, &mut doc);

    assert_eq!(doc.live_text(), "B. C. A.");
    assert_eq!(last_reply(&bot), r#"Movi "A." para depois de "C."."#);
}

#[test]
fn test_move_block_before_anchor() {
    let mut doc = service("A. B. C.");
    let mut bot = assistant();
    bot.submit(r#"move paragraph "C." before "A.""#, &mut doc);

    assert_eq!(doc.live_text(), "C. A. B.");
    assert_eq!(last_reply(&bot), r#"Movi "C." para antes de "A."."#);
}

#[test]
fn test_move_needs_unique_blocks() {
    let mut doc = service("A. B. A.");
    let mut bot = assistant();
    bot.submit(r#"mova "A." para depois de "B.""#, &mut doc);
    assert_eq!(
        last_reply(&bot),
        r#""A." aparece 2 vezes no documento. Use um trecho mais específico."#
    );

    bot.submit(r#"mova "B." para depois de "D.""#, &mut doc);
    assert_eq!(last_reply(&bot), r#"Não encontrei "D." no documento."#);
    assert_eq!(doc.live_text(), "A. B. A.");
}

#[test]
fn test_free_text_is_dispatched_with_the_document() {
    let mut doc = service("Citem-se o réu.");
    let session = SessionContext {
        document_id: Some("doc-1".to_string()),
        document_type: Some("petição".to_string()),
        user_id: "adv-7".to_string(),
    };
    let mut bot = EditorAssistant::new(session, 20);
    bot.submit(r#"substitua "réu" por "requerido""#, &mut doc);

    let TurnOutcome::Dispatch(request) = bot.submit("Está claro?", &mut doc) else {
        panic!("expected a dispatch");
    };
    assert_eq!(request.operation, Operation::Chat);
    assert_eq!(request.message, "Está claro?");
    assert_eq!(request.full_document_content, "Citem-se o requerido.");
    assert_eq!(request.document_id.as_deref(), Some("doc-1"));
    assert_eq!(request.document_type.as_deref(), Some("petição"));
    assert_eq!(request.user_id, "adv-7");
    assert_eq!(
        request.context,
        "Usuário: substitua \"réu\" por \"requerido\"\nAssistente: Substituí \"réu\" por \"requerido\"."
    );
    assert_eq!(bot.state(), AssistantState::AwaitingAssistantReply);

    let id = bot.receive_reply(Ok(reply("Está claro, sem sugestões.")));
    let turn = bot.transcript().get(id).unwrap();
    assert_eq!(turn.author, Author::Assistant);
    assert_eq!(turn.model_used.as_deref(), Some("modelo-teste"));
    assert!(!turn.applicable);
    assert_eq!(bot.state(), AssistantState::Idle);
}

#[test]
fn test_unreachable_endpoint_gives_the_contingency_reply() {
    let mut doc = service("texto");
    let mut bot = assistant();
    let id = bot.submit_blocking("Olá", &mut doc, &Down).unwrap();

    let turn = bot.transcript().get(id).unwrap();
    assert_eq!(turn.content, CONTINGENCY_MESSAGE);
    assert!(!turn.applicable);
    assert_eq!(bot.state(), AssistantState::Idle);
}

#[test]
fn test_empty_input_is_ignored() {
    let mut doc = service("texto");
    let mut bot = assistant();
    assert_eq!(bot.submit("   ", &mut doc), TurnOutcome::Handled);
    assert!(bot.transcript().is_empty());
}

#[test]
fn test_analysis_request() {
    let mut doc = service("Cláusula primeira.");
    let mut bot = assistant();
    let request = bot.request_analysis(&mut doc);
    assert_eq!(request.operation, Operation::Analyze);
    assert_eq!(request.full_document_content, "Cláusula primeira.");
    assert_eq!(bot.transcript().len(), 1);
    assert_eq!(bot.state(), AssistantState::AwaitingAssistantReply);
}

#[test]
fn test_requests_carry_the_cached_text_after_a_write() {
    let mut doc = service("Cláusula primeira.");
    assert!(doc.insert_at(0, "Nova "));
    assert_eq!(doc.snapshot().unwrap().plain_text, "Cláusula primeira.");

    let mut bot = assistant();
    let request = bot.request_analysis(&mut doc);
    assert_eq!(request.full_document_content, "Nova Cláusula primeira.");
    assert_eq!(doc.snapshot().unwrap().plain_text, "Nova Cláusula primeira.");
    assert_eq!(doc.plain_text(), request.full_document_content);
}

#[test]
fn test_suggestion_can_be_applied() {
    let mut doc = service("Texto antigo.");
    let mut bot = assistant();
    let id = bot
        .submit_blocking(
            "Melhore a frase",
            &mut doc,
            &Canned(r#"Sugestão: "Texto novo." fica mais claro."#),
        )
        .unwrap();
    assert!(bot.transcript().get(id).unwrap().applicable);

    assert!(bot.apply_suggestion(id, 0, 13, &mut doc));
    assert_eq!(doc.live_text(), "Texto novo.");
    assert_eq!(last_reply(&bot), "Sugestão aplicada ao documento.");

    assert!(bot.apply_suggestion(id, 11, 0, &mut doc));
    assert_eq!(doc.live_text(), "Texto novo.Texto novo.");
}

#[test]
fn test_suggestion_needs_an_applicable_assistant_turn() {
    let mut doc = service("Texto.");
    let mut bot = assistant();
    let id = bot.submit_blocking("Oi", &mut doc, &Canned("Olá!")).unwrap();

    assert!(!bot.apply_suggestion(id, 0, 0, &mut doc));
    assert_eq!(
        last_reply(&bot),
        format!("A mensagem {id} não traz trecho para aplicar.")
    );
    assert!(!bot.apply_suggestion(0, 0, 0, &mut doc));
    assert!(!bot.apply_suggestion(99, 0, 0, &mut doc));
    assert_eq!(last_reply(&bot), "Não há mensagem 99 na conversa.");
    assert_eq!(doc.live_text(), "Texto.");
}

#[test]
fn test_rating_turns() {
    let mut doc = service("Texto.");
    let mut bot = assistant();
    let id = bot.submit_blocking("Oi", &mut doc, &Canned("Olá!")).unwrap();

    let turn = bot
        .rate_turn(id, Some(true), Some(4), Some("boa".to_string()))
        .unwrap();
    assert_eq!(turn.rating, Some(4));
    assert_eq!(turn.usefulness, Some(true));
    assert_eq!(
        bot.rate_turn(id, None, Some(6), None).unwrap_err(),
        FeedbackError::RatingOutOfRange(6)
    );
    assert_eq!(
        bot.rate_turn(0, None, Some(3), None).unwrap_err(),
        FeedbackError::NotAssistant(0)
    );
    assert_eq!(
        bot.rate_turn(42, None, None, None).unwrap_err(),
        FeedbackError::UnknownTurn(42)
    );
}

#[test]
fn test_applicability_markers() {
    assert!(is_applicable("Minha sugestão é reescrever o pedido."));
    assert!(is_applicable("Correction: use the defined term."));
    assert!(is_applicable("Trecho sugerido abaixo."));
    assert!(!is_applicable("Tudo certo com o documento."));
}

#[test]
fn test_excerpt_extraction() {
    assert_eq!(
        suggested_excerpt("Segue:\n```text\nCláusula 1.\n```\nAbraço"),
        "Cláusula 1."
    );
    assert_eq!(
        suggested_excerpt("Use “Exmo. Sr.” no início."),
        "Exmo. Sr."
    );
    assert_eq!(suggested_excerpt(r#"Troque por "data venia"."#), "data venia");
    assert_eq!(suggested_excerpt("  sem marcação \n"), "sem marcação");
}
