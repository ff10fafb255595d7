use sqlx::SqlitePool;

use crate::models::{NewTodoRequest, Todo};

pub async fn fetch_todos(db: &SqlitePool) -> Result<Vec<Todo>, sqlx::Error> {
    sqlx::query_as::<_, Todo>("SELECT id, title, completed FROM todos ORDER BY id DESC")
        .fetch_all(db)
        .await
}

#[cfg(test)]
pub async fn find_todo_by_id(db: &SqlitePool, id: i64) -> Result<Option<Todo>, sqlx::Error> {
    sqlx::query_as::<_, Todo>("SELECT id, title, completed FROM todos WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Callers validate the title; this only persists it.
pub async fn insert_todo(db: &SqlitePool, req: NewTodoRequest) -> Result<Todo, sqlx::Error> {
    let id = sqlx::query("INSERT INTO todos (title, completed) VALUES (?, ?)")
        .bind(&req.title)
        .bind(false)
        .execute(db)
        .await?
        .last_insert_rowid();

    Ok(Todo {
        id,
        title: req.title,
        completed: false,
    })
}

/// Flips `completed` in a single statement, so concurrent toggles of the
/// same row are serialized by SQLite. Returns `None` when no row matches.
pub async fn toggle_todo(db: &SqlitePool, id: i64) -> Result<Option<Todo>, sqlx::Error> {
    sqlx::query_as::<_, Todo>(
        r#"
        UPDATE todos
        SET completed = NOT completed
        WHERE id = ?
        RETURNING id, title, completed
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn delete_todo(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM todos WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_test_db;

    fn new_todo(title: &str) -> NewTodoRequest {
        NewTodoRequest {
            title: title.to_string(),
        }
    }

    #[tokio::test]
    async fn test_fetch_empty() {
        let pool = setup_test_db().await;

        let todos = fetch_todos(&pool).await.expect("Failed to fetch todos");
        assert!(todos.is_empty());
    }

    #[tokio::test]
    async fn test_insert_and_fetch_todo() {
        let pool = setup_test_db().await;

        let todo = insert_todo(&pool, new_todo("Buy milk"))
            .await
            .expect("Failed to insert todo");
        assert!(todo.id > 0);
        assert_eq!(todo.title, "Buy milk");
        assert!(!todo.completed);

        let stored = find_todo_by_id(&pool, todo.id)
            .await
            .expect("Failed to find todo")
            .expect("Todo not found");
        assert_eq!(stored, todo);
    }

    #[tokio::test]
    async fn test_fetch_orders_newest_first() {
        let pool = setup_test_db().await;

        let a = insert_todo(&pool, new_todo("A")).await.expect("Failed to insert A");
        let b = insert_todo(&pool, new_todo("B")).await.expect("Failed to insert B");
        assert!(b.id > a.id);

        let todos = fetch_todos(&pool).await.expect("Failed to fetch todos");
        let titles: Vec<&str> = todos.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores() {
        let pool = setup_test_db().await;

        let todo = insert_todo(&pool, new_todo("宿題1")).await.expect("Failed to insert todo");

        let once = toggle_todo(&pool, todo.id)
            .await
            .expect("Failed to toggle todo")
            .expect("Todo not found");
        assert!(once.completed);
        assert_eq!(once.title, "宿題1");

        let twice = toggle_todo(&pool, todo.id)
            .await
            .expect("Failed to toggle todo")
            .expect("Todo not found");
        assert_eq!(twice, todo);
    }

    #[tokio::test]
    async fn test_toggle_missing() {
        let pool = setup_test_db().await;

        let result = toggle_todo(&pool, 42).await.expect("Failed to toggle todo");
        assert!(result.is_none());

        let todos = fetch_todos(&pool).await.expect("Failed to fetch todos");
        assert!(todos.is_empty());
    }

    #[tokio::test]
    async fn test_delete_todo() {
        let pool = setup_test_db().await;

        let todo = insert_todo(&pool, new_todo("宿題1")).await.expect("Failed to insert todo");

        assert!(delete_todo(&pool, todo.id).await.expect("Failed to delete todo"));
        assert!(find_todo_by_id(&pool, todo.id).await.expect("Failed to find todo").is_none());

        // 二回目は対象なし
        assert!(!delete_todo(&pool, todo.id).await.expect("Failed to delete todo"));
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let pool = setup_test_db().await;

        let first = insert_todo(&pool, new_todo("A")).await.expect("Failed to insert A");
        delete_todo(&pool, first.id).await.expect("Failed to delete A");

        let second = insert_todo(&pool, new_todo("B")).await.expect("Failed to insert B");
        assert!(second.id > first.id);
    }
}
