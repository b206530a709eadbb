use std::io::{self, Write};

use anyhow::{bail, Context};
use datastore::{DataContext, DataContextFactory, EntityEvent};
use domain::{ContactSpecs, PHONE_TYPES};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::cli::{Command, EntryArgs};
use crate::models::{call_list, ContactEntry, ContactView};

pub fn run_command(
    command: Command,
    factory: &dyn DataContextFactory,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match command {
        Command::Add(args) => cmd_add(factory, read_entry(&args)?, out),
        Command::Get(args) => cmd_get(factory, args.id, out),
        Command::List => cmd_list(factory, out),
        Command::CallList => cmd_call_list(factory, out),
        Command::Edit(args) => cmd_edit(factory, args.id, read_entry(&args.entry)?, out),
        Command::Delete(args) => cmd_delete(factory, args.id, out),
    }
}

fn read_entry(args: &EntryArgs) -> anyhow::Result<ContactEntry> {
    let raw = if args.entry == "-" {
        io::read_to_string(io::stdin()).context("reading contact from stdin")?
    } else {
        args.entry.clone()
    };
    let entry: ContactEntry = serde_json::from_str(&raw).context("parsing contact JSON")?;
    if !entry.is_valid() {
        bail!("invalid phone type, expected one of {}", PHONE_TYPES.join(", "));
    }
    Ok(entry)
}

fn open(factory: &dyn DataContextFactory) -> anyhow::Result<DataContext> {
    let mut ctx = factory.create_data_context()?;
    ctx.observe(log_event);
    Ok(ctx)
}

fn log_event(event: &mut EntityEvent<'_>) {
    debug!(
        event = ?event.kind,
        entity = event.entity_type,
        id = event.id,
        "entity lifecycle"
    );
}

fn print<T: Serialize>(out: &mut dyn Write, value: &T) -> anyhow::Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn cmd_add(
    factory: &dyn DataContextFactory,
    entry: ContactEntry,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let mut ctx = open(factory)?;
    let handle = ctx.add(entry.to_entity());
    ctx.save_changes()?;
    let id = ctx
        .entity(&handle)
        .map(|c| c.contact_id)
        .context("added contact is no longer tracked")?;
    ctx.close()?;
    info!(contact_id = id, "contact added");
    print(out, &json!({ "id": id }))
}

fn cmd_get(factory: &dyn DataContextFactory, id: i64, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut ctx = open(factory)?;
    let Some(contact) = ctx.find_single(&ContactSpecs::get(id))? else {
        bail!("contact {id} not found");
    };
    ctx.close()?;
    print(out, &ContactView::from_entity(&contact))
}

fn cmd_list(factory: &dyn DataContextFactory, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut ctx = open(factory)?;
    let contacts = ctx.find(&ContactSpecs::get_all())?;
    ctx.close()?;
    let views: Vec<_> = contacts.iter().map(ContactView::from_entity).collect();
    print(out, &views)
}

fn cmd_call_list(factory: &dyn DataContextFactory, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut ctx = open(factory)?;
    let contacts = ctx.find(&ContactSpecs::get_call_list())?;
    ctx.close()?;
    print(out, &call_list(&contacts))
}

fn cmd_edit(
    factory: &dyn DataContextFactory,
    id: i64,
    entry: ContactEntry,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let mut ctx = open(factory)?;
    let updated = ctx.update_where(&ContactSpecs::get(id), |contact| {
        entry.update_entity(contact)
    })?;
    if updated.is_none() {
        bail!("contact {id} not found");
    }
    let report = ctx.close()?;
    info!(contact_id = id, changes = report.changes.len(), "contact updated");
    print(out, &json!({ "id": id }))
}

fn cmd_delete(
    factory: &dyn DataContextFactory,
    id: i64,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let mut ctx = open(factory)?;
    let deleted = match ctx.find_single(&ContactSpecs::get(id))? {
        Some(contact) => {
            ctx.delete(contact);
            true
        }
        None => false,
    };
    ctx.close()?;
    if deleted {
        info!(contact_id = id, "contact deleted");
    }
    print(out, &json!({ "id": id, "deleted": deleted }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{EditArgs, IdArgs};
    use domain::{InMemoryDataContextFactory, InMemoryDataList};
    use serde_json::Value;

    fn run(factory: &InMemoryDataContextFactory, command: Command) -> anyhow::Result<Value> {
        let mut out = Vec::new();
        run_command(command, factory, &mut out)?;
        Ok(serde_json::from_slice(&out)?)
    }

    fn entry(json: &str) -> EntryArgs {
        EntryArgs {
            entry: json.to_string(),
        }
    }

    fn factory() -> InMemoryDataContextFactory {
        InMemoryDataContextFactory::new(InMemoryDataList::default())
    }

    #[test]
    fn add_then_get_round_trips_the_graph() {
        let factory = factory();
        let added = run(
            &factory,
            Command::Add(entry(
                r#"{"email":"a@b.com","name":{"first":"Ann","last":"Bell"},
                    "phone":[{"number":"555","type":"home"}]}"#,
            )),
        )
        .unwrap();
        assert_eq!(added["id"], 1);

        let got = run(&factory, Command::Get(IdArgs { id: 1 })).unwrap();
        assert_eq!(got["email"], "a@b.com");
        assert_eq!(got["name"]["last"], "Bell");
        assert_eq!(got["phone"][0]["type"], "home");
        assert_eq!(factory.data().phones.len(), 1);
    }

    #[test]
    fn invalid_phone_type_is_rejected_before_storage() {
        let factory = factory();
        let err = run(
            &factory,
            Command::Add(entry(r#"{"email":"a@b.com","phone":[{"number":"1","type":"fax"}]}"#)),
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid phone type"));
        assert!(factory.data().contacts.is_empty());
    }

    #[test]
    fn edit_and_delete_of_unknown_contact() {
        let factory = factory();
        let err = run(
            &factory,
            Command::Edit(EditArgs {
                id: 9,
                entry: entry(r#"{"email":"x@y.com"}"#),
            }),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not found"));

        let deleted = run(&factory, Command::Delete(IdArgs { id: 9 })).unwrap();
        assert_eq!(deleted["deleted"], false);
    }

    #[test]
    fn call_list_only_includes_home_phones() {
        let factory = factory();
        for json in [
            r#"{"email":"r@x.com","name":{"first":"Troy","last":"Roson"},"phone":[{"number":"1","type":"home"}]}"#,
            r#"{"email":"w@x.com","name":{"first":"Wes","last":"Adams"},"phone":[{"number":"2","type":"work"}]}"#,
            r#"{"email":"b@x.com","name":{"first":"Ann","last":"Bell"},"phone":[{"number":"3","type":"home"}]}"#,
        ] {
            run(&factory, Command::Add(entry(json))).unwrap();
        }
        let calls = run(&factory, Command::CallList).unwrap();
        let names: Vec<_> = calls
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"]["last"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Bell", "Roson"]);

        run(
            &factory,
            Command::Edit(EditArgs {
                id: 1,
                entry: entry(r#"{"email":"r@x.com","phone":[]}"#),
            }),
        )
        .unwrap();
        assert_eq!(factory.data().phones.len(), 2);
        let listed = run(&factory, Command::List).unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 3);
    }
}
