//! The dispatcher's balance number: the smallest `B` such that filling every
//! worker up to `B` absorbs all expired tasks (§4.4 step 4, §8-3, §8-4).

/// Find the smallest non-negative `B` such that
/// `sum(max(0, B - n_i) for n_i in num_tasks) >= expired_count`.
///
/// Solved by binary search on `[0, expired_count + sum(num_tasks) + 1]`,
/// which is always a valid upper bound: at that `B` every worker absorbs at
/// least `expired_count` tasks between them.
pub fn find_balance_number(num_tasks: &[u32], expired_count: u64) -> u64 {
    if expired_count == 0 {
        return 0;
    }

    let sum_existing: u64 = num_tasks.iter().map(|&n| n as u64).sum();
    let mut lo: u64 = 0;
    let mut hi: u64 = expired_count + sum_existing + 1;

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if absorbed(num_tasks, mid) >= expired_count {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }

    lo
}

fn absorbed(num_tasks: &[u32], balance: u64) -> u64 {
    num_tasks
        .iter()
        .map(|&n| balance.saturating_sub(n as u64))
        .sum()
}

/// Walk `workers` (in their given order) and hand off tasks from the front of
/// `expired` until each worker with `num_tasks < balance` is filled to
/// `balance` or `expired` is drained, whichever comes first.
///
/// Returns, per worker index, the slice of `expired` handed to that worker.
/// Workers not mentioned in the result received nothing.
pub fn plan_handoff<T>(num_tasks: &[u32], balance: u64, mut expired: Vec<T>) -> Vec<Vec<T>> {
    let mut plan = vec![Vec::new(); num_tasks.len()];

    for (idx, &n) in num_tasks.iter().enumerate() {
        if expired.is_empty() {
            break;
        }

        let deficit = balance.saturating_sub(n as u64);
        let take = (deficit as usize).min(expired.len());
        if take == 0 {
            continue;
        }

        plan[idx] = expired.drain(..take).collect();
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_number_empty_workers_and_no_expired() {
        assert_eq!(find_balance_number(&[], 0), 0);
    }

    #[test]
    fn balance_number_matches_brute_force() {
        // Brute force reference implementation for a handful of cases.
        fn brute_force(num_tasks: &[u32], expired_count: u64) -> u64 {
            let mut b = 0u64;
            loop {
                let absorbed: u64 = num_tasks
                    .iter()
                    .map(|&n| b.saturating_sub(n as u64))
                    .sum();
                if absorbed >= expired_count {
                    return b;
                }
                b += 1;
            }
        }

        let cases: &[(&[u32], u64)] = &[
            (&[0, 0, 0], 10),
            (&[5, 2, 8], 3),
            (&[5, 2, 8], 0),
            (&[3], 7),
            (&[1, 1, 1, 1], 1),
            (&[10, 0], 5),
        ];

        for &(num_tasks, expired) in cases {
            assert_eq!(
                find_balance_number(num_tasks, expired),
                brute_force(num_tasks, expired),
                "num_tasks={num_tasks:?} expired={expired}"
            );
        }
    }

    #[test]
    fn dispatcher_fairness_bound_holds() {
        // Property 3: after a dispatch cycle, no worker ends with more than
        // max(n_i, B) + 1 tasks, and the total count equals k + sum(n_i).
        let num_tasks = [5u32, 2, 8, 0];
        let expired_count = 11u64;
        let balance = find_balance_number(&num_tasks, expired_count);

        let expired: Vec<u32> = (0..expired_count as u32).collect();
        let plan = plan_handoff(&num_tasks, balance, expired);

        let mut total_handed = 0u64;
        for (idx, handed) in plan.iter().enumerate() {
            let new_count = num_tasks[idx] as u64 + handed.len() as u64;
            assert!(
                new_count <= (num_tasks[idx] as u64).max(balance) + 1,
                "worker {idx} ended with {new_count}, bound was {}",
                (num_tasks[idx] as u64).max(balance) + 1
            );
            total_handed += handed.len() as u64;
        }

        assert_eq!(total_handed, expired_count);

        let new_total: u64 = num_tasks.iter().map(|&n| n as u64).sum::<u64>() + total_handed;
        let old_total: u64 = num_tasks.iter().map(|&n| n as u64).sum();
        assert_eq!(new_total, expired_count + old_total);
    }

    #[test]
    fn handoff_only_fills_deficient_workers_in_order() {
        let plan = plan_handoff(&[0, 3, 1], 2, vec!["a", "b", "c", "d"]);
        assert_eq!(plan[0], vec!["a", "b"]);
        assert_eq!(plan[1], Vec::<&str>::new());
        assert_eq!(plan[2], vec!["c"]);
    }
}
