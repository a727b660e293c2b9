//! Todo-list scenario.
//!
//! A small application state built on a change-log input, with a fake list
//! view that mirrors rows through snapshot + edit callbacks the way a table
//! widget would.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use ripple_core::{ChangeLog, Comparator, Edit, Input, Node, SubscriptionSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Todo {
    title: String,
    done: bool,
}

impl Todo {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            done: false,
        }
    }
}

struct Todos {
    items: Input<ChangeLog<Todo>>,
}

impl Todos {
    fn new() -> Self {
        Self {
            items: Input::new(ChangeLog::default()),
        }
    }

    fn add(&self, title: &str) {
        self.items.append(Todo::new(title));
    }

    fn toggle(&self, title: &str) {
        let Some(index) = self
            .items
            .with_value(|log| log.and_then(|log| log.position(|todo| todo.title == title)))
        else {
            return;
        };
        self.items.mutate(index, |todo| todo.done = !todo.done);
    }

    fn delete(&self, title: &str) {
        let title = title.to_string();
        self.items.remove_where(move |todo| todo.title == title);
    }

    fn remaining(&self) -> Node<usize> {
        self.items
            .map(|log| log.iter().filter(|todo| !todo.done).count())
    }
}

/// Rows of a table, kept in sync edit by edit.
#[derive(Default)]
struct ListView {
    rows: Vec<String>,
    reloads: usize,
    edits: usize,
}

impl ListView {
    fn bind(view: &Rc<RefCell<Self>>, rows: &Node<ChangeLog<String>>, scope: &mut SubscriptionSet) {
        let (on_reload, on_edit) = (view.clone(), view.clone());
        scope.add(rows.subscribe_changes(
            move |items| {
                let mut view = on_reload.borrow_mut();
                view.rows = items.to_vec();
                view.reloads += 1;
            },
            move |edit: &Edit<String>| {
                let mut view = on_edit.borrow_mut();
                edit.clone()
                    .apply_to(&mut view.rows)
                    .expect("edit fits the mirrored rows");
                view.edits += 1;
            },
        ));
        scope.keep_alive(rows.clone());
    }
}

/// Finished items first, then alphabetical.
fn done_first() -> Comparator<Todo> {
    Rc::new(|a: &Todo, b: &Todo| b.done.cmp(&a.done).then_with(|| a.title.cmp(&b.title)))
}

fn by_title() -> Comparator<Todo> {
    Rc::new(|a: &Todo, b: &Todo| a.title.cmp(&b.title))
}

fn order(comparator: Comparator<Todo>) -> Input<Comparator<Todo>> {
    Input::with_equality(comparator, |a: &Comparator<Todo>, b: &Comparator<Todo>| {
        Rc::ptr_eq(a, b)
    })
}

fn label(todo: &Todo) -> String {
    let mark = if todo.done { "x" } else { " " };
    format!("[{mark}] {}", todo.title)
}

#[test]
fn list_view_tracks_todos_incrementally() {
    let todos = Todos::new();
    todos.add("buy milk");

    let view = Rc::new(RefCell::new(ListView::default()));
    let mut scope = SubscriptionSet::new();
    ListView::bind(&view, &todos.items.map_items(label), &mut scope);
    assert_eq!(view.borrow().rows, vec!["[ ] buy milk"]);

    todos.add("write report");
    todos.add("call home");
    todos.toggle("buy milk");
    todos.delete("write report");

    let view = view.borrow();
    assert_eq!(view.rows, vec!["[x] buy milk", "[ ] call home"]);
    assert_eq!(view.reloads, 1);
    assert_eq!(view.edits, 4);
}

#[test]
fn remaining_count_updates() {
    let todos = Todos::new();
    let remaining = todos.remaining();
    let counts = Rc::new(RefCell::new(Vec::new()));
    let sink = counts.clone();
    let _subscription = remaining.subscribe(move |n| sink.borrow_mut().push(*n));

    todos.add("a");
    todos.add("b");
    todos.toggle("a");
    // Toggling an unknown title changes nothing
    todos.toggle("zzz");
    todos.delete("a");

    assert_eq!(*counts.borrow(), vec![0, 1, 2, 1]);
}

#[test]
fn tearing_down_the_scope_stops_updates() {
    let todos = Todos::new();
    let view = Rc::new(RefCell::new(ListView::default()));
    let mut scope = SubscriptionSet::new();
    ListView::bind(&view, &todos.items.map_items(label), &mut scope);

    todos.add("one");
    scope.release_all();
    todos.add("two");

    assert_eq!(view.borrow().rows, vec!["[ ] one"]);
    assert_eq!(todos.items.subscriber_count(), 0);
}

#[test]
fn state_survives_a_save_and_load() {
    let todos = Todos::new();
    todos.add("persist me");
    todos.add("and me");
    todos.toggle("and me");

    let saved = todos
        .items
        .with_value(|log| serde_json::to_string(&log.expect("todos hold a value")))
        .unwrap();
    let restored: ChangeLog<Todo> = serde_json::from_str(&saved).unwrap();

    let current = todos.items.current_value().unwrap();
    assert_eq!(restored, current);
    assert_eq!(restored.changes(), current.changes());
    assert!(restored.get(1).unwrap().done);
}

#[test]
fn sorted_view_moves_finished_items_to_the_top() {
    let todos = Todos::new();
    for title in ["walk dog", "buy milk", "call home"] {
        todos.add(title);
    }

    let view = Rc::new(RefCell::new(ListView::default()));
    let mut scope = SubscriptionSet::new();
    let sorted = todos.items.sorted_by(&order(done_first()));
    ListView::bind(&view, &sorted.map_items(label), &mut scope);
    assert_eq!(
        view.borrow().rows,
        vec!["[ ] buy milk", "[ ] call home", "[ ] walk dog"]
    );

    todos.toggle("walk dog");
    assert_eq!(
        view.borrow().rows,
        vec!["[x] walk dog", "[ ] buy milk", "[ ] call home"]
    );

    todos.add("answer mail");
    todos.delete("buy milk");

    let view = view.borrow();
    assert_eq!(
        view.rows,
        vec!["[x] walk dog", "[ ] answer mail", "[ ] call home"]
    );
    // Toggle is a move plus a replace; add and delete one edit each.
    assert_eq!(view.edits, 4);
    assert_eq!(view.reloads, 1);
}

#[test]
fn switching_the_order_reloads_the_view() {
    let todos = Todos::new();
    for title in ["b", "a", "c"] {
        todos.add(title);
    }
    todos.toggle("c");

    let ordering = order(done_first());
    let view = Rc::new(RefCell::new(ListView::default()));
    let mut scope = SubscriptionSet::new();
    ListView::bind(&view, &todos.items.sorted_by(&ordering).map_items(label), &mut scope);
    assert_eq!(view.borrow().rows, vec!["[x] c", "[ ] a", "[ ] b"]);

    ordering.write(by_title());
    assert_eq!(view.borrow().rows, vec!["[ ] a", "[ ] b", "[x] c"]);
    assert_eq!(view.borrow().reloads, 2);

    todos.toggle("a");
    assert_eq!(view.borrow().rows, vec!["[x] a", "[ ] b", "[x] c"]);
    assert_eq!(view.borrow().reloads, 2);
}
