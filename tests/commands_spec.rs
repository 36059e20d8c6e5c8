use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use procedure_roster::commands::*;
use procedure_roster::db::Database;
use procedure_roster::models::*;
use procedure_roster::store::AssociationStore;

const INVALID_IDS: [i64; 3] = [-1, 0, i64::MIN];

fn setup() -> Database {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    db
}

/// Plan `plan_id` with procedure `procedure_id` linked and the given users as members.
/// Every member id is created as a user.
fn seed_plan_procedure(db: &Database, plan_id: i64, procedure_id: i64, members: &[i64]) {
    db.create_plan(plan_id).expect("Failed to create plan");
    db.create_procedure(procedure_id, "Test Procedure")
        .expect("Failed to create procedure");
    for &user_id in members {
        db.create_user(user_id, "Test user").expect("Failed to create user");
    }
    db.add_procedure_to_plan(plan_id, procedure_id, members)
        .expect("Failed to link procedure");
}

fn add(plan_id: i64, procedure_id: i64, user_id: i64) -> AddUserToProcedureCommand {
    AddUserToProcedureCommand {
        plan_id,
        procedure_id,
        user_id,
    }
}

fn remove(plan_id: i64, procedure_id: i64, user_id: i64) -> RemoveUserFromProcedureCommand {
    RemoveUserFromProcedureCommand {
        plan_id,
        procedure_id,
        user_id,
    }
}

fn remove_all(plan_id: i64, procedure_id: i64) -> RemoveAllUsersFromProcedureCommand {
    RemoveAllUsersFromProcedureCommand {
        plan_id,
        procedure_id,
    }
}

/// A store that counts calls and fails every one of them.
#[derive(Clone, Default)]
struct FailingStore {
    calls: Arc<AtomicUsize>,
}

impl FailingStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("connection refused"))
    }
}

#[async_trait]
impl AssociationStore for FailingStore {
    async fn get_plan_with_associations(&self, _plan_id: i64) -> Result<Option<Plan>> {
        self.fail()
    }

    async fn get_procedure(&self, _procedure_id: i64) -> Result<Option<Procedure>> {
        self.fail()
    }

    async fn get_user(&self, _user_id: i64) -> Result<Option<User>> {
        self.fail()
    }

    async fn persist(&self, _plan: &Plan) -> Result<()> {
        self.fail()
    }
}

/// Delegates lookups to a real database but refuses to persist.
#[derive(Clone)]
struct ReadOnlyStore {
    db: Database,
}

#[async_trait]
impl AssociationStore for ReadOnlyStore {
    async fn get_plan_with_associations(&self, plan_id: i64) -> Result<Option<Plan>> {
        self.db.get_plan_with_associations(plan_id).await
    }

    async fn get_procedure(&self, procedure_id: i64) -> Result<Option<Procedure>> {
        self.db.get_procedure(procedure_id).await
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.db.get_user(user_id).await
    }

    async fn persist(&self, _plan: &Plan) -> Result<()> {
        Err(anyhow::anyhow!("database is read-only"))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LastLookup {
    Procedure,
    User,
}

/// Delegates to a real database and cancels the request as soon as `last` has been
/// looked up, so the handler reaches the persist step with a cancelled token.
#[derive(Clone)]
struct CancelAfterLookupStore {
    db: Database,
    cancel: CancellationToken,
    last: LastLookup,
}

impl CancelAfterLookupStore {
    fn cancel_after(&self, lookup: LastLookup) {
        if self.last == lookup {
            self.cancel.cancel();
        }
    }
}

#[async_trait]
impl AssociationStore for CancelAfterLookupStore {
    async fn get_plan_with_associations(&self, plan_id: i64) -> Result<Option<Plan>> {
        self.db.get_plan_with_associations(plan_id).await
    }

    async fn get_procedure(&self, procedure_id: i64) -> Result<Option<Procedure>> {
        let procedure = self.db.get_procedure(procedure_id).await;
        self.cancel_after(LastLookup::Procedure);
        procedure
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let user = self.db.get_user(user_id).await;
        self.cancel_after(LastLookup::User);
        user
    }

    async fn persist(&self, plan: &Plan) -> Result<()> {
        self.db.persist(plan).await
    }
}

fn assert_bad_request(result: CommandResult<()>, expected: IdField) {
    match result {
        Err(CommandError::BadRequest { field, .. }) => assert_eq!(field, expected),
        other => panic!("expected BadRequest({}), got {:?}", expected, other),
    }
}

fn assert_not_found(result: CommandResult<()>, expected: Entity) {
    match result {
        Err(CommandError::NotFound { entity, .. }) => assert_eq!(entity, expected),
        other => panic!("expected NotFound({}), got {:?}", expected, other),
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn invalid_ids_never_reach_the_store() {
        let store = FailingStore::default();
        let cancel = CancellationToken::new();
        let add_handler = AddUserToProcedureHandler::new(store.clone());
        let remove_handler = RemoveUserFromProcedureHandler::new(store.clone());
        let remove_all_handler = RemoveAllUsersFromProcedureHandler::new(store.clone());

        for id in INVALID_IDS {
            assert_bad_request(add_handler.handle(add(id, 1, 1), &cancel).await, IdField::PlanId);
            assert_bad_request(
                add_handler.handle(add(1, id, 1), &cancel).await,
                IdField::ProcedureId,
            );
            assert_bad_request(add_handler.handle(add(1, 1, id), &cancel).await, IdField::UserId);

            assert_bad_request(
                remove_handler.handle(remove(id, 1, 1), &cancel).await,
                IdField::PlanId,
            );
            assert_bad_request(
                remove_handler.handle(remove(1, id, 1), &cancel).await,
                IdField::ProcedureId,
            );
            assert_bad_request(
                remove_handler.handle(remove(1, 1, id), &cancel).await,
                IdField::UserId,
            );

            assert_bad_request(
                remove_all_handler.handle(remove_all(id, 1), &cancel).await,
                IdField::PlanId,
            );
            assert_bad_request(
                remove_all_handler.handle(remove_all(1, id), &cancel).await,
                IdField::ProcedureId,
            );
        }

        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn negative_plan_id_is_reported_by_name() {
        let handler = AddUserToProcedureHandler::new(FailingStore::default());
        let err = handler
            .handle(add(-1, 1, 1), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid PlanId");
    }

    #[tokio::test]
    async fn invalid_ids_leave_membership_untouched() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[1]);
        let handler = RemoveAllUsersFromProcedureHandler::new(db.clone());

        let result = handler
            .handle(remove_all(1, 0), &CancellationToken::new())
            .await;

        assert_bad_request(result, IdField::ProcedureId);
        assert_eq!(db.get_member_ids(1, 1).unwrap(), vec![1]);
    }
}

mod add_user {
    use super::*;

    #[tokio::test]
    async fn assigns_user_to_empty_procedure() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[]);
        db.create_user(1, "Test user").unwrap();
        let handler = AddUserToProcedureHandler::new(db.clone());

        let result = handler.handle(add(1, 1, 1), &CancellationToken::new()).await;

        assert_eq!(result, Ok(()));
        assert_eq!(db.get_member_ids(1, 1).unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn adding_twice_keeps_a_single_membership() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[]);
        db.create_user(1, "Test user").unwrap();
        let handler = AddUserToProcedureHandler::new(db.clone());
        let cancel = CancellationToken::new();

        handler.handle(add(1, 1, 1), &cancel).await.unwrap();
        let second = handler.handle(add(1, 1, 1), &cancel).await;

        assert_eq!(second, Ok(()));
        assert_eq!(db.get_member_ids(1, 1).unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn existing_member_succeeds_without_persisting() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[1]);
        let handler = AddUserToProcedureHandler::new(ReadOnlyStore { db: db.clone() });

        let result = handler.handle(add(1, 1, 1), &CancellationToken::new()).await;

        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn keeps_other_members() {
        let db = setup();
        seed_plan_procedure(&db, 2, 3, &[4, 5]);
        db.create_user(6, "Test user").unwrap();
        let handler = AddUserToProcedureHandler::new(db.clone());

        handler
            .handle(add(2, 3, 6), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(db.get_member_ids(2, 3).unwrap(), vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn missing_plan_is_not_found() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[]);
        db.create_user(1, "Test user").unwrap();
        let handler = AddUserToProcedureHandler::new(db.clone());

        let result = handler.handle(add(2, 1, 1), &CancellationToken::new()).await;

        assert_eq!(
            result.clone().unwrap_err().to_string(),
            "PlanId: 2 not found"
        );
        assert_not_found(result, Entity::Plan);
        assert!(db.get_member_ids(1, 1).unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_procedure_is_not_found() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[]);
        db.create_user(1, "Test user").unwrap();
        let handler = AddUserToProcedureHandler::new(db.clone());

        let result = handler.handle(add(1, 9, 1), &CancellationToken::new()).await;

        assert_eq!(
            result.clone().unwrap_err().to_string(),
            "ProcedureId: 9 not found"
        );
        assert_not_found(result, Entity::Procedure);
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[]);
        let handler = AddUserToProcedureHandler::new(db.clone());

        let result = handler.handle(add(1, 1, 5), &CancellationToken::new()).await;

        assert_eq!(
            result.clone().unwrap_err().to_string(),
            "UserId: 5 not found"
        );
        assert_not_found(result, Entity::User);
        assert!(db.get_member_ids(1, 1).unwrap().is_empty());
    }

    #[tokio::test]
    async fn procedure_not_on_plan_is_not_found() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[]);
        db.create_procedure(2, "Unlinked Procedure").unwrap();
        db.create_user(1, "Test user").unwrap();
        let handler = AddUserToProcedureHandler::new(db.clone());

        let result = handler.handle(add(1, 2, 1), &CancellationToken::new()).await;

        assert_not_found(result, Entity::PlanProcedure);
    }
}

mod remove_user {
    use super::*;

    #[tokio::test]
    async fn removes_only_the_targeted_user() {
        let db = setup();
        seed_plan_procedure(&db, 3, 4, &[5, 6, 7]);
        let handler = RemoveUserFromProcedureHandler::new(db.clone());

        let result = handler
            .handle(remove(3, 4, 5), &CancellationToken::new())
            .await;

        assert_eq!(result, Ok(()));
        assert_eq!(db.get_member_ids(3, 4).unwrap(), vec![6, 7]);
    }

    #[tokio::test]
    async fn does_not_delete_the_user_record() {
        let db = setup();
        seed_plan_procedure(&db, 1, 2, &[3]);
        let handler = RemoveUserFromProcedureHandler::new(db.clone());

        handler
            .handle(remove(1, 2, 3), &CancellationToken::new())
            .await
            .unwrap();

        assert!(db.get_member_ids(1, 2).unwrap().is_empty());
        assert!(db.get_user(3).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found_even_when_association_exists() {
        let db = setup();
        seed_plan_procedure(&db, 1, 2, &[]);
        let handler = RemoveUserFromProcedureHandler::new(db.clone());

        let result = handler
            .handle(remove(1, 2, 99), &CancellationToken::new())
            .await;

        assert_eq!(
            result.clone().unwrap_err().to_string(),
            "No user found for the given Ids"
        );
        assert_not_found(result, Entity::User);
    }

    #[tokio::test]
    async fn existing_non_member_is_a_no_op_success() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[1]);
        db.create_user(2, "Test user").unwrap();
        let handler = RemoveUserFromProcedureHandler::new(db.clone());

        let result = handler
            .handle(remove(1, 1, 2), &CancellationToken::new())
            .await;

        assert_eq!(result, Ok(()));
        assert_eq!(db.get_member_ids(1, 1).unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn missing_plan_or_procedure_is_not_found() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[1]);
        let handler = RemoveUserFromProcedureHandler::new(db.clone());
        let cancel = CancellationToken::new();

        assert_not_found(handler.handle(remove(8, 1, 1), &cancel).await, Entity::Plan);
        assert_not_found(
            handler.handle(remove(1, 8, 1), &cancel).await,
            Entity::Procedure,
        );
        assert_eq!(db.get_member_ids(1, 1).unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn procedure_not_on_plan_is_not_found() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[1]);
        db.create_procedure(2, "Unlinked Procedure").unwrap();
        let handler = RemoveUserFromProcedureHandler::new(db.clone());

        let result = handler
            .handle(remove(1, 2, 1), &CancellationToken::new())
            .await;

        assert_eq!(
            result.clone().unwrap_err().to_string(),
            "No procedure 2 on plan 1"
        );
        assert_not_found(result, Entity::PlanProcedure);
        assert_eq!(db.get_member_ids(1, 1).unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn add_then_remove_restores_membership() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[1, 2]);
        db.create_user(3, "Test user").unwrap();
        let cancel = CancellationToken::new();
        let original = db.get_member_ids(1, 1).unwrap();

        AddUserToProcedureHandler::new(db.clone())
            .handle(add(1, 1, 3), &cancel)
            .await
            .unwrap();
        RemoveUserFromProcedureHandler::new(db.clone())
            .handle(remove(1, 1, 3), &cancel)
            .await
            .unwrap();

        assert_eq!(db.get_member_ids(1, 1).unwrap(), original);
    }
}

mod remove_all_users {
    use super::*;

    #[tokio::test]
    async fn empty_procedure_stays_empty() {
        let db = setup();
        seed_plan_procedure(&db, 1, 2, &[]);
        let handler = RemoveAllUsersFromProcedureHandler::new(ReadOnlyStore { db: db.clone() });

        let result = handler
            .handle(remove_all(1, 2), &CancellationToken::new())
            .await;

        // The read-only store would fail a persist, so success proves none happened.
        assert_eq!(result, Ok(()));
        assert!(db.get_member_ids(1, 2).unwrap().is_empty());
    }

    #[tokio::test]
    async fn clears_every_member() {
        for size in [1, 3, 10] {
            let db = setup();
            let members: Vec<i64> = (1..=size).collect();
            seed_plan_procedure(&db, 1, 1, &members);
            let handler = RemoveAllUsersFromProcedureHandler::new(db.clone());

            handler
                .handle(remove_all(1, 1), &CancellationToken::new())
                .await
                .unwrap();

            assert!(db.get_member_ids(1, 1).unwrap().is_empty());
            assert_eq!(db.user_count().unwrap(), size);
        }
    }

    #[tokio::test]
    async fn leaves_other_procedures_alone() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[1, 2]);
        db.create_procedure(2, "Second Procedure").unwrap();
        db.add_procedure_to_plan(1, 2, &[1]).unwrap();
        let handler = RemoveAllUsersFromProcedureHandler::new(db.clone());

        handler
            .handle(remove_all(1, 1), &CancellationToken::new())
            .await
            .unwrap();

        assert!(db.get_member_ids(1, 1).unwrap().is_empty());
        assert_eq!(db.get_member_ids(1, 2).unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn procedure_not_on_plan_is_not_found() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[1]);
        db.create_procedure(2, "Unlinked Procedure").unwrap();
        let handler = RemoveAllUsersFromProcedureHandler::new(db.clone());

        let result = handler
            .handle(remove_all(1, 2), &CancellationToken::new())
            .await;

        assert_not_found(result, Entity::PlanProcedure);
        assert_eq!(db.get_member_ids(1, 1).unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn missing_plan_or_procedure_is_not_found() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[1]);
        let handler = RemoveAllUsersFromProcedureHandler::new(db.clone());
        let cancel = CancellationToken::new();

        assert_not_found(handler.handle(remove_all(5, 1), &cancel).await, Entity::Plan);
        assert_not_found(
            handler.handle(remove_all(1, 5), &cancel).await,
            Entity::Procedure,
        );
        assert_eq!(db.get_member_ids(1, 1).unwrap(), vec![1]);
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn store_faults_are_internal() {
        let store = FailingStore::default();
        let handler = AddUserToProcedureHandler::new(store.clone());

        let err = handler
            .handle(add(1, 1, 1), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn persist_faults_are_internal() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[1]);
        let handler = RemoveAllUsersFromProcedureHandler::new(ReadOnlyStore { db: db.clone() });

        let err = handler
            .handle(remove_all(1, 1), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(db.get_member_ids(1, 1).unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn cancelled_requests_do_not_mutate() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[1]);
        db.create_user(2, "Test user").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = AddUserToProcedureHandler::new(db.clone())
            .handle(add(1, 1, 2), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::cancelled());

        let err = RemoveAllUsersFromProcedureHandler::new(db.clone())
            .handle(remove_all(1, 1), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        assert_eq!(db.get_member_ids(1, 1).unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn cancellation_after_loading_skips_persist() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[1]);
        db.create_user(2, "Test user").unwrap();

        let cancel = CancellationToken::new();
        let store = CancelAfterLookupStore {
            db: db.clone(),
            cancel: cancel.clone(),
            last: LastLookup::User,
        };
        let err = AddUserToProcedureHandler::new(store)
            .handle(add(1, 1, 2), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, CommandError::Internal("request cancelled".to_string()));
        assert_eq!(db.get_member_ids(1, 1).unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn cancellation_after_loading_skips_persist_for_removals() {
        let db = setup();
        seed_plan_procedure(&db, 1, 1, &[1, 2]);

        let cancel = CancellationToken::new();
        let store = CancelAfterLookupStore {
            db: db.clone(),
            cancel: cancel.clone(),
            last: LastLookup::User,
        };
        let err = RemoveUserFromProcedureHandler::new(store)
            .handle(remove(1, 1, 1), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::cancelled());

        let cancel = CancellationToken::new();
        let store = CancelAfterLookupStore {
            db: db.clone(),
            cancel: cancel.clone(),
            last: LastLookup::Procedure,
        };
        let err = RemoveAllUsersFromProcedureHandler::new(store)
            .handle(remove_all(1, 1), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, CommandError::cancelled());

        assert_eq!(db.get_member_ids(1, 1).unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn validation_wins_over_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = RemoveUserFromProcedureHandler::new(FailingStore::default())
            .handle(remove(0, 1, 1), &cancel)
            .await;

        assert_bad_request(result, IdField::PlanId);
    }
}
