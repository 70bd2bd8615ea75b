//! Cluster entropy quality.
//!
//! A tight cluster repeats the same tokens across its members, which keeps
//! the Shannon entropy of token occurrences low; `1 - H / H_max` therefore
//! lands near 1.0 for clean clusters and near 0.0 for incoherent ones.
//!
//! Token lists are split into a *name* part and an *address* part at the
//! first token containing a digit, and the two parts are blended 0.76/0.24.
//! The split is a convention for US residential address data; on corpora
//! without house numbers everything counts as the name part.

const NAME_WEIGHT: f64 = 0.76;

fn split_name_address(tokens: &[String]) -> (Vec<&str>, Vec<&str>) {
    let mut name = Vec::new();
    let mut address = Vec::new();
    let mut found_number = false;
    for token in tokens {
        if !found_number && token.chars().any(|c| c.is_ascii_digit()) {
            found_number = true;
        }
        if found_number {
            address.push(token.as_str());
        } else {
            name.push(token.as_str());
        }
    }
    (name, address)
}

/// `1 - H / H_max` over one part of a cluster, where `H_max` is the entropy
/// of a cluster of the same size sharing no token at all.
fn entropy_quality(cluster: &[Vec<&str>]) -> f64 {
    let cluster_size = cluster.len();
    if cluster_size == 0 {
        return 1.0;
    }
    let token_count: usize = cluster.iter().map(Vec::len).sum();
    if token_count == 0 {
        return 1.0;
    }
    let base_prob = 1.0 / cluster_size as f64;
    let base = -(token_count as f64) * base_prob * base_prob.log2();
    if base == 0.0 {
        return 1.0;
    }

    // Each token of member j absorbs one matching occurrence from every
    // later member, so a token shared by c members contributes a single
    // term with probability c / cluster_size.
    let mut entropy = 0.0;
    let mut working: Vec<Vec<&str>> = cluster.to_vec();
    for j in 0..cluster_size - 1 {
        let (head, tail) = working.split_at_mut(j + 1);
        for token in &head[j] {
            let mut count = 1u64;
            for later in tail.iter_mut() {
                if let Some(position) = later.iter().position(|t| t == token) {
                    count += 1;
                    later.remove(position);
                }
            }
            let probability = count as f64 / cluster_size as f64;
            entropy -= probability * probability.log2();
        }
    }
    for _token in &working[cluster_size - 1] {
        let probability = 1.0 / cluster_size as f64;
        entropy -= probability * probability.log2();
    }

    1.0 - entropy / base
}

/// The entropy quality of one cluster, given the token list of each member.
pub fn cluster_entropy(members: &[&[String]]) -> f64 {
    let mut name_part = Vec::with_capacity(members.len());
    let mut address_part = Vec::with_capacity(members.len());
    let mut name_count = 0;
    let mut address_count = 0;
    for tokens in members {
        let (name, address) = split_name_address(tokens);
        name_count += name.len();
        address_count += address.len();
        name_part.push(name);
        address_part.push(address);
    }

    let name_quality = entropy_quality(&name_part);
    let address_quality = entropy_quality(&address_part);
    if name_count > 0 && address_count > 0 {
        NAME_WEIGHT * name_quality + (1.0 - NAME_WEIGHT) * address_quality
    } else if name_count > 0 {
        name_quality
    } else {
        address_quality
    }
}
